//! In-memory stand-in for `sheep` and `dog`.
//!
//! `SimCluster` answers the commands the harness issues the way a small
//! sheepdog cluster would: VDIs live in memory, `vdi write` drops the data
//! object into the `obj/` directory of as many disks as there are copies,
//! and `umount` empties the mount directory. Disk tooling (`mkfs`, `mount`)
//! always succeeds; `ls`, `find` and `cksum` run for real.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use sheepdog_harness::{
    CommandOutput, CommandRunner, CommandSpec, Harness, HarnessConfig, HarnessResult, ObjectId,
    SystemRunner,
};

#[derive(Debug, Clone)]
struct SimVdi {
    id: u32,
    size: u64,
    data: Vec<u8>,
    copies: u32,
    snapshot: bool,
    cloned: bool,
}

#[derive(Default)]
struct SimState {
    /// Keyed by (name, tag).
    vdis: BTreeMap<(String, String), SimVdi>,
    next_id: u32,
    copies: u32,
    formatted: bool,
    /// Mount points of started nodes, in start order.
    disks: Vec<PathBuf>,
    started_ports: Vec<u16>,
    killed_ports: Vec<u16>,
    shutdown: bool,
}

#[derive(Default)]
pub struct SimCluster {
    state: RefCell<SimState>,
    /// Port on which `sheep` refuses to start.
    pub fail_start_port: Option<u16>,
}

pub fn sim_harness(work_dir: &Path) -> Harness<SimCluster> {
    sim_harness_with(work_dir, SimCluster::default())
}

pub fn sim_harness_with(work_dir: &Path, sim: SimCluster) -> Harness<SimCluster> {
    let config = HarnessConfig {
        work_dir: work_dir.to_path_buf(),
        privilege: Vec::new(),
        checksum: PathBuf::from("cksum"),
        ..HarnessConfig::default()
    };
    Harness::new(sim, config)
}

fn ok(stdout: impl Into<Vec<u8>>) -> HarnessResult<CommandOutput> {
    Ok(CommandOutput::ok(stdout))
}

fn fail(msg: &str) -> HarnessResult<CommandOutput> {
    Ok(CommandOutput::failed(1, msg))
}

impl SimCluster {
    /// A cluster whose `sheep` refuses to start on `port`.
    pub fn failing_start(port: u16) -> Self {
        Self {
            fail_start_port: Some(port),
            ..Self::default()
        }
    }

    pub fn started_ports(&self) -> Vec<u16> {
        self.state.borrow().started_ports.clone()
    }

    pub fn killed_ports(&self) -> Vec<u16> {
        self.state.borrow().killed_ports.clone()
    }

    pub fn is_shutdown(&self) -> bool {
        self.state.borrow().shutdown
    }

    fn sheep(&self, args: &[String]) -> HarnessResult<CommandOutput> {
        let port = port_of(args).unwrap_or(7000);
        if self.fail_start_port == Some(port) {
            return fail("cannot bind listen port");
        }
        let Some(disks) = args.last() else {
            return fail("no disks");
        };
        let mut st = self.state.borrow_mut();
        for disk in disks.split(',') {
            let disk = PathBuf::from(disk);
            fs::create_dir_all(disk.join("obj"))?;
            st.disks.push(disk);
        }
        st.started_ports.push(port);
        ok("")
    }

    /// Cluster and node subcommands; `vdi` is dispatched separately.
    fn dog(&self, args: &[String]) -> HarnessResult<CommandOutput> {
        let port = port_of(args);
        let words: Vec<&str> = strip_port(args);
        let mut st = self.state.borrow_mut();

        match words.as_slice() {
            ["node", "kill", "--local"] => {
                st.killed_ports.push(port.unwrap_or(7000));
                ok("")
            }
            ["cluster", "format", "--force", "--copies", n] => {
                st.copies = n.parse().unwrap_or(1);
                st.formatted = true;
                ok("")
            }
            ["cluster", "shutdown"] => {
                st.shutdown = true;
                ok("")
            }
            _ => fail("unknown dog command"),
        }
    }

    fn vdi(&self, words: &[&str], stdin: &[u8]) -> HarnessResult<CommandOutput> {
        let mut st = self.state.borrow_mut();
        let st = &mut *st;

        match words {
            ["create", rest @ ..] => {
                let (name, size) = match rest {
                    ["--prealloc", name, size] | [name, size] => (*name, *size),
                    _ => return fail("bad create"),
                };
                if st.vdis.contains_key(&key(name, "")) {
                    return fail("VDI exists already");
                }
                let id = st.alloc_id();
                let vdi = SimVdi {
                    id,
                    size: size.parse().unwrap_or(0),
                    data: Vec::new(),
                    copies: st.copies,
                    snapshot: false,
                    cloned: false,
                };
                st.vdis.insert(key(name, ""), vdi);
                ok("")
            }
            ["delete", "--snapshot", tag, name] => match st.vdis.remove(&key(name, tag)) {
                Some(_) => ok(""),
                None => fail("No VDI found"),
            },
            ["delete", name] => match st.vdis.remove(&key(name, "")) {
                Some(_) => ok(""),
                None => fail("No VDI found"),
            },
            ["list", "--raw"] => {
                let mut out = String::new();
                for ((name, tag), v) in &st.vdis {
                    let flag = if v.snapshot {
                        's'
                    } else if v.cloned {
                        'c'
                    } else {
                        '='
                    };
                    out.push_str(&format!(
                        "{} {} 0 {} 0 0 1383888200 {:x} {} {} 22\n",
                        flag, name, v.size, v.id, v.copies, tag
                    ));
                }
                ok(out)
            }
            ["write", name] => {
                let Some(v) = st.vdis.get_mut(&key(name, "")) else {
                    return fail("No VDI found");
                };
                if stdin.len() as u64 > v.size {
                    return fail("write beyond end of VDI");
                }
                if v.data.len() < stdin.len() {
                    v.data.resize(stdin.len(), 0);
                }
                v.data[..stdin.len()].copy_from_slice(stdin);
                let (id, copies, data) = (v.id, v.copies, v.data.clone());
                st.place_object(ObjectId::data(id, 0), copies, &data)?;
                ok("")
            }
            ["read", rest @ ..] => {
                let (tag, rest) = match rest {
                    ["--snapshot", tag, rest @ ..] => (*tag, rest),
                    _ => ("", rest),
                };
                let (name, offset, length) = match rest {
                    [name] => (*name, None, None),
                    [name, off] => (*name, off.parse::<u64>().ok(), None),
                    [name, off, len] => (*name, off.parse::<u64>().ok(), len.parse::<u64>().ok()),
                    _ => return fail("bad read"),
                };
                let Some(v) = st.vdis.get(&key(name, tag)) else {
                    return fail("No VDI found");
                };
                let mut image = v.data.clone();
                image.resize(v.size as usize, 0);
                let start = offset.unwrap_or(0).min(v.size) as usize;
                let end = match length {
                    Some(len) => (start as u64 + len).min(v.size) as usize,
                    None => v.size as usize,
                };
                ok(image[start..end].to_vec())
            }
            ["snapshot", "--snapshot", tag, name] => {
                let Some(base) = st.vdis.get(&key(name, "")).cloned() else {
                    return fail("No VDI found");
                };
                if st.vdis.contains_key(&key(name, tag)) {
                    return fail("VDI exists already");
                }
                let snap = SimVdi {
                    id: st.alloc_id(),
                    snapshot: true,
                    ..base
                };
                st.vdis.insert(key(name, tag), snap);
                ok("")
            }
            ["clone", "--snapshot", tag, src, dst] => {
                let Some(base) = st.vdis.get(&key(src, tag)).cloned() else {
                    return fail("No VDI found");
                };
                if !base.snapshot {
                    return fail("Only snapshot VDIs can be cloned");
                }
                if st.vdis.contains_key(&key(dst, "")) {
                    return fail("VDI exists already");
                }
                let clone = SimVdi {
                    id: st.alloc_id(),
                    snapshot: false,
                    cloned: true,
                    ..base
                };
                st.vdis.insert(key(dst, ""), clone);
                ok("")
            }
            _ => fail("unknown vdi command"),
        }
    }

    fn umount(&self, args: &[String]) -> HarnessResult<CommandOutput> {
        // Unmounting hides everything sheep wrote to the disk.
        let Some(mnt) = args.first() else {
            return fail("umount: no target");
        };
        let mnt = PathBuf::from(mnt);
        fs::remove_dir_all(&mnt)?;
        fs::create_dir(&mnt)?;
        self.state.borrow_mut().disks.retain(|d| d != &mnt);
        ok("")
    }
}

impl SimState {
    fn alloc_id(&mut self) -> u32 {
        self.next_id += 1;
        0x7c2b00 + self.next_id
    }

    fn place_object(&self, oid: ObjectId, copies: u32, data: &[u8]) -> HarnessResult<()> {
        for disk in self.disks.iter().take(copies as usize) {
            fs::write(disk.join("obj").join(oid.file_name(0)), data)?;
        }
        Ok(())
    }
}

fn key(name: &str, tag: &str) -> (String, String) {
    (name.to_string(), tag.to_string())
}

fn port_of(args: &[String]) -> Option<u16> {
    args.iter()
        .position(|a| a == "--port")
        .and_then(|i| args.get(i + 1))
        .and_then(|p| p.parse().ok())
}

fn strip_port(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut iter = args.iter();
    while let Some(a) = iter.next() {
        if a == "--port" {
            iter.next();
        } else {
            out.push(a.as_str());
        }
    }
    out
}

impl CommandRunner for SimCluster {
    fn run(&self, spec: &CommandSpec) -> HarnessResult<CommandOutput> {
        let argv = spec.argv();
        let (program, args) = argv.split_first().expect("argv has a program");

        match program.as_str() {
            "dog" => {
                let words = strip_port(args);
                if let ["vdi", rest @ ..] = words.as_slice() {
                    if !self.state.borrow().formatted {
                        return fail("Waiting for cluster to be formatted");
                    }
                    let stdin = spec.stdin.clone().unwrap_or_default();
                    return self.vdi(rest, &stdin);
                }
                self.dog(args)
            }
            "sheep" => self.sheep(args),
            "umount" => self.umount(args),
            "mkfs.xfs" | "mount" => ok(""),
            _ => SystemRunner.run(spec),
        }
    }
}
