//! Synthetic system-information provider.
//!
//! ```text
//! /
//! ├── cpus/          one indexed directory per cpu, created on demand
//! │   └── <n>/
//! │       ├── id
//! │       └── online
//! ├── hostname
//! ├── version
//! └── self -> cpus/0
//! ```

use serde::{Deserialize, Serialize};
use tracing::trace;
use vtreefs_core::{InodeArena, InodeStat, Provider};
use vtreefs_types::{make_error, make_error_msg, InodeNo, Result, StatusCode, VtreeCode};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SysInfoConfig {
    pub cpus: u32,
    pub hostname: String,
    pub version: String,
}

impl Default for SysInfoConfig {
    fn default() -> Self {
        Self {
            cpus: 4,
            hostname: "localhost".into(),
            version: concat!("vtreefs-demo ", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuField {
    Id,
    Online,
}

impl CpuField {
    const ALL: [CpuField; 2] = [CpuField::Id, CpuField::Online];

    fn name(self) -> &'static str {
        match self {
            CpuField::Id => "id",
            CpuField::Online => "online",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// What an inode stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Cpus,
    Cpu(u32),
    CpuField(u32, CpuField),
    Hostname,
    Version,
    SelfLink,
}

pub struct SysInfo {
    config: SysInfoConfig,
    /// Holds the rendering of the file being read.
    scratch: Vec<u8>,
}

impl SysInfo {
    pub fn new(config: SysInfoConfig) -> Self {
        Self {
            config,
            scratch: Vec::new(),
        }
    }

    fn render(&self, node: Node) -> Option<String> {
        match node {
            Node::Hostname => Some(format!("{}\n", self.config.hostname)),
            Node::Version => Some(format!("{}\n", self.config.version)),
            Node::CpuField(n, CpuField::Id) => Some(format!("{n}\n")),
            Node::CpuField(_, CpuField::Online) => Some("1\n".into()),
            _ => None,
        }
    }

    fn add_file(
        &self,
        arena: &mut InodeArena<Node>,
        parent: InodeNo,
        name: &str,
        index: Option<u32>,
        node: Node,
    ) -> Result<InodeNo> {
        let size = self.render(node).map_or(0, |s| s.len() as u64);
        arena.create(parent, name, index, InodeStat::regular(0o444, size), 0, node)
    }

    fn add_cpu(&self, arena: &mut InodeArena<Node>, cpus: InodeNo, n: u32) -> Result<InodeNo> {
        trace!(cpu = n, "materializing cpu directory");
        let stat = InodeStat::directory(0o555);
        arena.create(cpus, &n.to_string(), Some(n), stat, CpuField::ALL.len() as u32, Node::Cpu(n))
    }

    fn add_cpu_field(
        &self,
        arena: &mut InodeArena<Node>,
        cpu_dir: InodeNo,
        n: u32,
        field: CpuField,
    ) -> Result<InodeNo> {
        let index = CpuField::ALL.iter().position(|f| *f == field).unwrap_or(0) as u32;
        self.add_file(arena, cpu_dir, field.name(), Some(index), Node::CpuField(n, field))
    }

    fn node_of(arena: &InodeArena<Node>, ino: InodeNo) -> Result<Option<Node>> {
        Ok(arena.get(ino)?.handle().copied())
    }
}

impl Provider for SysInfo {
    type Handle = Node;

    fn init(&mut self, arena: &mut InodeArena<Node>) -> Result<()> {
        let root = arena.root();
        arena.create(
            root,
            "cpus",
            None,
            InodeStat::directory(0o555),
            self.config.cpus,
            Node::Cpus,
        )?;
        self.add_file(arena, root, "hostname", None, Node::Hostname)?;
        self.add_file(arena, root, "version", None, Node::Version)?;
        arena.create(root, "self", None, InodeStat::symlink(), 0, Node::SelfLink)?;
        Ok(())
    }

    fn lookup(&mut self, arena: &mut InodeArena<Node>, parent: InodeNo, name: &str) -> Result<()> {
        if arena.lookup_by_name(parent, name).is_some() {
            return Ok(());
        }
        match Self::node_of(arena, parent)? {
            Some(Node::Cpus) => {
                if let Ok(n) = name.parse::<u32>() {
                    if n < self.config.cpus && n.to_string() == name {
                        self.add_cpu(arena, parent, n)?;
                    }
                }
            }
            Some(Node::Cpu(n)) => {
                if let Some(field) = CpuField::from_name(name) {
                    self.add_cpu_field(arena, parent, n, field)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn refresh_directory(&mut self, arena: &mut InodeArena<Node>, dir: InodeNo) -> Result<()> {
        match Self::node_of(arena, dir)? {
            Some(Node::Cpus) => {
                for n in 0..self.config.cpus {
                    if arena.lookup_by_index(dir, n).is_none() {
                        self.add_cpu(arena, dir, n)?;
                    }
                }
            }
            Some(Node::Cpu(n)) => {
                for field in CpuField::ALL {
                    if arena.lookup_by_name(dir, field.name()).is_none() {
                        self.add_cpu_field(arena, dir, n, field)?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn read(
        &mut self,
        arena: &InodeArena<Node>,
        ino: InodeNo,
        offset: u64,
        len: usize,
    ) -> Result<&[u8]> {
        let Some(text) = Self::node_of(arena, ino)?.and_then(|n| self.render(n)) else {
            return make_error(StatusCode::IO_ERROR);
        };
        self.scratch = text.into_bytes();
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(self.scratch.len());
        let end = start.saturating_add(len).min(self.scratch.len());
        Ok(&self.scratch[start..end])
    }

    fn readlink(&mut self, arena: &InodeArena<Node>, ino: InodeNo) -> Result<String> {
        match Self::node_of(arena, ino)? {
            Some(Node::SelfLink) => Ok("cpus/0".into()),
            _ => make_error_msg(VtreeCode::NOT_FOUND, format!("inode {ino} has no target")),
        }
    }
}
