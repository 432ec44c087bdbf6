mod sysinfo;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use vtreefs_core::dirent::decode;
use vtreefs_core::ops::LookupRequest;
use vtreefs_core::reply::{LookupReply, NodeDetails};
use vtreefs_core::{FileKind, FsOps, InodeStat, VtreeConfig, VtreeFs};
use vtreefs_logging::LogConfig;
use vtreefs_types::{DevNo, InodeNo};

use sysinfo::{SysInfo, SysInfoConfig};

/// Browse a synthetic system-information tree served by vtreefs.
#[derive(Parser, Debug)]
#[command(name = "vtreefs-demo", version, about)]
struct Cli {
    /// Path to a TOML file with `[vtree]`, `[log]` and `[sysinfo]` tables.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at debug level regardless of the configured level.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the whole tree.
    Tree,
    /// List a directory.
    Ls { path: String },
    /// Print a file.
    Cat { path: String },
    /// Print a symlink's target.
    Readlink { path: String },
    /// Print a node's attributes.
    Stat { path: String },
    /// Print filesystem statistics.
    Statvfs,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct DemoConfig {
    vtree: VtreeConfig,
    log: LogConfig,
    sysinfo: SysInfoConfig,
}

impl DemoConfig {
    fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        config.vtree.validate()?;
        Ok(config)
    }
}

type Fs = VtreeFs<SysInfo>;

/// Resolve `path` from the root, restarting on absolute symlinks.
fn resolve(fs: &mut Fs, path: &str, follow: bool) -> anyhow::Result<NodeDetails> {
    let root = fs.arena().root();
    let mut path = path.to_string();
    let mut symlinks = 0;
    loop {
        let reply = {
            let mut req = LookupRequest::new(root, &path).with_symlinks(symlinks);
            if !follow {
                req = req.no_follow();
            }
            fs.lookup(&req).with_context(|| format!("lookup {path}"))?
        };
        if reply.is_redirect() {
            tracing::debug!(%path, code = reply.code(), "lookup redirected");
        }
        match reply {
            LookupReply::Node(details) => return Ok(details),
            LookupReply::Symlink {
                path: next,
                symlinks: n,
            } => {
                path = next;
                symlinks = n;
            }
            LookupReply::LeaveBoundary { .. } => bail!("{path} leads outside the tree"),
        }
    }
}

fn list_dir(fs: &mut Fs, dir: InodeNo) -> anyhow::Result<Vec<(String, FileKind)>> {
    let mut entries = Vec::new();
    let mut buf = vec![0u8; 1024];
    let mut position = 0;
    loop {
        let listing = fs.getdents(dir, position, &mut buf)?;
        entries.extend(decode(&buf[..listing.bytes]).map(|r| (r.name, r.kind)));
        position = listing.next_position;
        if listing.end {
            return Ok(entries);
        }
    }
}

fn kind_char(kind: FileKind) -> char {
    match kind {
        FileKind::Directory => 'd',
        FileKind::Symlink => 'l',
        FileKind::Regular => '-',
        _ => '?',
    }
}

fn print_tree(fs: &mut Fs, dir: InodeNo, depth: usize) -> anyhow::Result<()> {
    for (name, kind) in list_dir(fs, dir)? {
        if name == "." || name == ".." {
            continue;
        }
        let is_dir = kind == FileKind::Directory;
        let suffix = if is_dir { "/" } else { "" };
        println!("{:indent$}{name}{suffix}", "", indent = depth * 2);
        if is_dir {
            let req = LookupRequest::new(dir, &name).no_follow();
            if let LookupReply::Node(child) = fs.lookup(&req)? {
                let result = print_tree(fs, child.ino, depth + 1);
                fs.put_node(child.ino, 1)?;
                result?;
            }
        }
    }
    Ok(())
}

fn cat(fs: &mut Fs, ino: InodeNo) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    let mut buf = vec![0u8; 512];
    let mut offset = 0;
    loop {
        let r = fs.read(ino, offset, &mut buf)?;
        if r.bytes == 0 {
            return Ok(());
        }
        out.write_all(&buf[..r.bytes])?;
        offset = r.next_offset;
    }
}

fn print_stat(details: &NodeDetails) {
    let st: &InodeStat = &details.stat;
    println!("inode: {}", details.ino);
    println!("dev:   {}", details.dev);
    println!("kind:  {:?}", st.kind());
    println!("mode:  {:o}", st.mode);
    println!("owner: {}:{}", st.uid, st.gid);
    println!("size:  {}", st.size);
}

fn run(fs: &mut Fs, command: Command) -> anyhow::Result<()> {
    let root = fs.arena().root();
    match command {
        Command::Tree => print_tree(fs, root, 0),
        Command::Statvfs => {
            let st = fs.statvfs()?;
            println!(
                "bsize: {}  files: {}  free: {}  namemax: {}",
                st.bsize, st.files, st.ffree, st.namemax
            );
            Ok(())
        }
        Command::Ls { path } => {
            let node = resolve(fs, &path, true)?;
            let result = list_dir(fs, node.ino).map(|entries| {
                for (name, kind) in entries {
                    println!("{} {name}", kind_char(kind));
                }
            });
            fs.put_node(node.ino, 1)?;
            result
        }
        Command::Cat { path } => {
            let node = resolve(fs, &path, true)?;
            let result = cat(fs, node.ino);
            fs.put_node(node.ino, 1)?;
            result
        }
        Command::Readlink { path } => {
            let node = resolve(fs, &path, false)?;
            let mut buf = [0u8; 1024];
            let result = fs.readlink(node.ino, &mut buf);
            fs.put_node(node.ino, 1)?;
            let n = result?;
            println!("{}", String::from_utf8_lossy(&buf[..n]));
            Ok(())
        }
        Command::Stat { path } => {
            let node = resolve(fs, &path, false)?;
            print_stat(&node);
            fs.put_node(node.ino, 1)?;
            Ok(())
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => DemoConfig::load(path)?,
        None => DemoConfig::default(),
    };
    let mut log = config.log.clone();
    if cli.verbose {
        log.level = "debug".into();
    }
    let _guard = vtreefs_logging::init_logging(&log)?;

    let provider = SysInfo::new(config.sysinfo.clone());
    let (mut fs, mounted) = VtreeFs::mount(
        provider,
        config.vtree.clone(),
        DevNo(1),
        InodeStat::directory(0o555),
        0,
    )?;
    tracing::debug!(root = %mounted.root, "tree ready");

    let result = run(&mut fs, cli.command);
    let _provider = fs.unmount();
    result
}
