//! # Two-Phase Container Runner
//!
//! Runs a command inside a minimal Linux sandbox derived from a pulled
//! image. A single binary plays two roles, discriminated by the `IS_CHILD`
//! environment variable:
//!
//! - **Parent**: creates the v2 cgroup, clones itself into new UTS, PID,
//!   Mount, and User namespaces re-exec'ing `/proc/self/exe`, waits for the
//!   child, and propagates its exit code.
//! - **Child** (the re-exec): makes the mount tree private, sets the
//!   hostname, chroots into the image rootfs, mounts `/proc`, and execs the
//!   target command.
//!
//! ```text
//! Parent → CgroupReady → ChildSpawned → Reaped
//! Child  → NamespacesEntered → Pivoted → ProcMounted → Execed
//! ```
//!
//! The clone continuation writes its own identity uid/gid maps (container
//! root ↔ the invoking user, size 1) with setgroups disabled, which is the
//! single mapping an unprivileged process is permitted to install.
//!
//! Cgroup teardown is best-effort: on parent exit the process is moved back
//! to the root cgroup and the `gocker<pid>` directory removed; failures are
//! logged, never propagated.

use crate::constants::{CGROUP_CPU_MAX, CGROUP_MEMORY_MAX, CGROUP_ROOT, CHILD_ENV};
use crate::container::Container;
use crate::error::{Error, Result};
use nix::mount::{mount, MsFlags};
use nix::sched::{clone, unshare, CloneFlags};
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{chdir, chroot, execve, sethostname, Gid, Pid, Uid};
use std::ffi::CString;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// Stack size for the cloned child before it re-execs.
const CHILD_STACK_SIZE: usize = 1024 * 1024;

/// Executes one container invocation.
pub struct Runner {
    container: Container,
}

impl Runner {
    /// Creates a runner for the given container.
    pub fn new(container: Container) -> Self {
        Self { container }
    }

    /// Returns true when this process is the re-exec'd child phase.
    pub fn is_child() -> bool {
        std::env::var(CHILD_ENV).as_deref() == Ok("1")
    }

    /// Runs the container, dispatching on the phase sentinel.
    ///
    /// Returns the target process's exit code. Setup failures are errors;
    /// a non-zero exit of the containerized command is not.
    pub fn run(&self) -> Result<i32> {
        if Self::is_child() {
            self.run_child()
        } else {
            self.run_parent()
        }
    }

    // =========================================================================
    // Parent Phase
    // =========================================================================

    fn run_parent(&self) -> Result<i32> {
        let _cgroup = CgroupGuard::create(&self.container.cgroup_dir)?;

        let child = self.spawn_child()?;
        debug!("Spawned container child with PID {}", child);

        Self::wait_child(child)
    }

    /// Clones this binary into fresh namespaces.
    ///
    /// The continuation runs inside the new namespaces: it installs the
    /// identity uid/gid maps and execs `/proc/self/exe` with the original
    /// argv, the container environment, and `IS_CHILD=1`. Standard streams
    /// are inherited untouched.
    fn spawn_child(&self) -> Result<Pid> {
        let exe = CString::new("/proc/self/exe").map_err(|e| Error::Spawn(e.to_string()))?;

        let mut argv = vec![exe];
        for arg in std::env::args().skip(1) {
            argv.push(CString::new(arg).map_err(|e| Error::Spawn(e.to_string()))?);
        }

        let mut envp = Vec::with_capacity(self.container.env.len() + 1);
        for entry in &self.container.env {
            envp.push(CString::new(entry.as_str()).map_err(|e| Error::Spawn(e.to_string()))?);
        }
        envp.push(
            CString::new(format!("{}=1", CHILD_ENV)).map_err(|e| Error::Spawn(e.to_string()))?,
        );

        let uid = Uid::current();
        let gid = Gid::current();

        let flags = CloneFlags::CLONE_NEWUTS
            | CloneFlags::CLONE_NEWPID
            | CloneFlags::CLONE_NEWNS
            | CloneFlags::CLONE_NEWUSER;

        let mut stack = vec![0u8; CHILD_STACK_SIZE];

        // The continuation must not return to runner code; it either execs
        // or exits with a distinctive status.
        let child_main = Box::new(|| child_entry(&argv, &envp, uid, gid));

        // SAFETY: the child address space is a copy (no CLONE_VM); the
        // continuation only writes its own id maps and execs.
        unsafe { clone(child_main, &mut stack, flags, Some(Signal::SIGCHLD as i32)) }
            .map_err(|e| Error::Spawn(format!("clone failed: {}", e)))
    }

    /// Reaps the child and maps its wait status to an exit code.
    fn wait_child(child: Pid) -> Result<i32> {
        loop {
            match waitpid(child, None) {
                Ok(WaitStatus::Exited(_, code)) => return Ok(code),
                Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(128 + signal as i32),
                Ok(_) => continue,
                Err(nix::errno::Errno::EINTR) => continue,
                Err(e) => return Err(Error::Spawn(format!("waitpid failed: {}", e))),
            }
        }
    }

    // =========================================================================
    // Child Phase
    // =========================================================================

    fn run_child(&self) -> Result<i32> {
        self.setup_namespaces()?;
        self.setup_filesystem()?;
        self.mount_proc()?;
        self.exec_command()
    }

    /// Finishes namespace setup inside the clone.
    fn setup_namespaces(&self) -> Result<()> {
        // The clone already created the mount namespace; unshare again so
        // the setup below never lands in a shared tree.
        unshare(CloneFlags::CLONE_NEWNS)
            .map_err(|e| Error::Namespace(format!("failed to unshare mount namespace: {}", e)))?;

        // Stop mount events from propagating to the host namespace
        mount(
            None::<&str>,
            "/",
            None::<&str>,
            MsFlags::MS_PRIVATE | MsFlags::MS_REC,
            None::<&str>,
        )
        .map_err(|e| Error::Mount {
            target: "/".to_string(),
            reason: e.to_string(),
        })?;

        sethostname(&self.container.hostname)
            .map_err(|e| Error::Namespace(format!("failed to set hostname: {}", e)))?;

        Ok(())
    }

    /// Changes the root filesystem to the image rootfs.
    fn setup_filesystem(&self) -> Result<()> {
        let chroot_error = |e: nix::Error| Error::Chroot {
            path: self.container.rootfs.clone(),
            reason: e.to_string(),
        };

        chdir(&self.container.rootfs).map_err(chroot_error)?;
        chroot(".").map_err(chroot_error)?;
        chdir("/").map_err(chroot_error)?;

        let working_dir = Path::new(&self.container.working_dir);
        if let Err(e) = chdir(working_dir) {
            warn!(
                "failed to chdir to working dir {}: {}",
                self.container.working_dir, e
            );
        }

        Ok(())
    }

    /// Mounts the proc filesystem at `/proc` inside the new root.
    fn mount_proc(&self) -> Result<()> {
        let proc_dir = Path::new("/proc");
        if !proc_dir.exists() {
            fs::create_dir_all(proc_dir).map_err(|e| Error::Filesystem {
                path: proc_dir.to_path_buf(),
                reason: e.to_string(),
            })?;
            fs::set_permissions(proc_dir, fs::Permissions::from_mode(0o555)).map_err(|e| {
                Error::Filesystem {
                    path: proc_dir.to_path_buf(),
                    reason: e.to_string(),
                }
            })?;
        }

        mount(
            Some("proc"),
            "/proc",
            Some("proc"),
            MsFlags::empty(),
            None::<&str>,
        )
        .map_err(|e| Error::Mount {
            target: "/proc".to_string(),
            reason: e.to_string(),
        })
    }

    /// Replaces this process with the target command.
    ///
    /// The environment is rebuilt from the container env, dropping the
    /// phase sentinel; the working directory is wherever
    /// [`Runner::setup_filesystem`] left us. Only returns on failure.
    fn exec_command(&self) -> Result<i32> {
        let mut command = Command::new(&self.container.command);
        command.args(&self.container.args).env_clear();

        for entry in &self.container.env {
            if let Some((key, value)) = entry.split_once('=') {
                command.env(key, value);
            }
        }

        let err = command.exec();
        Err(Error::Spawn(format!(
            "failed to exec '{}': {}",
            self.container.command, err
        )))
    }
}

/// Continuation executed inside the cloned namespaces.
///
/// Runs with a copied address space before exec, so it stays minimal:
/// id-map installation and `execve`. Returns a distinctive status when
/// either step fails (the parent surfaces it as the exit code).
fn child_entry(argv: &[CString], envp: &[CString], uid: Uid, gid: Gid) -> isize {
    if write_id_maps(uid, gid).is_err() {
        return 125;
    }

    // execve only returns on failure
    let _ = execve(&argv[0], argv, envp);
    126
}

/// Installs identity uid/gid maps for the new user namespace.
///
/// setgroups must be disabled before an unprivileged process may write a
/// gid map; the single `0 <host-id> 1` line is the one mapping it may
/// install for itself.
fn write_id_maps(uid: Uid, gid: Gid) -> std::io::Result<()> {
    fs::write("/proc/self/setgroups", "deny")?;
    fs::write("/proc/self/gid_map", format!("0 {} 1", gid))?;
    fs::write("/proc/self/uid_map", format!("0 {} 1", uid))?;
    Ok(())
}

// =============================================================================
// Cgroup
// =============================================================================

/// v2 cgroup directory for one container invocation.
///
/// Created by the parent before the clone; the child inherits membership
/// through `cgroup.procs`. The child never writes to it. Teardown happens
/// on drop and is best-effort: the PID may already have been migrated.
struct CgroupGuard {
    path: PathBuf,
}

impl CgroupGuard {
    /// Creates the cgroup, applies the fixed limits, and enrolls the
    /// current process.
    fn create(path: &Path) -> Result<Self> {
        let cgroup_error = |reason: String| Error::Cgroup {
            path: path.to_path_buf(),
            reason,
        };

        fs::create_dir_all(path).map_err(|e| cgroup_error(e.to_string()))?;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .map_err(|e| cgroup_error(e.to_string()))?;

        fs::write(path.join("memory.max"), CGROUP_MEMORY_MAX)
            .map_err(|e| cgroup_error(format!("failed to set memory limit: {}", e)))?;

        fs::write(path.join("cpu.max"), CGROUP_CPU_MAX)
            .map_err(|e| cgroup_error(format!("failed to set CPU limit: {}", e)))?;

        fs::write(path.join("cgroup.procs"), std::process::id().to_string())
            .map_err(|e| cgroup_error(format!("failed to add process to cgroup: {}", e)))?;

        debug!("Cgroup created at {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for CgroupGuard {
    fn drop(&mut self) {
        // Move the process back to the root cgroup; the directory cannot
        // be removed while it still has members.
        let root_procs = Path::new(CGROUP_ROOT).join("cgroup.procs");
        if let Err(e) = fs::write(&root_procs, std::process::id().to_string()) {
            warn!("Failed to move process out of cgroup: {}", e);
        }

        if let Err(e) = fs::remove_dir(&self.path) {
            warn!(
                "Failed to remove cgroup directory {}: {}",
                self.path.display(),
                e
            );
        }
    }
}
