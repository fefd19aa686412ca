// Copyright 2021 - 2025 Martin Pool

//! The default `Launcher`: `dlopen`s the compiled shared object and calls
//! its test entry symbol directly inside the current process, the same
//! way `original_source/ForkProcessSandbox.cpp` calls its
//! `std::function<ExecutionStatus()>` in-process after `fork()` — the
//! test's pass/fail result is a plain function return value, not
//! something that has to cross another process boundary. `Engine` only
//! ever invokes this from inside a `Sandbox`-forked child, so a crash or
//! hang in the loaded code is still contained by the sandbox.

use std::ffi::{c_void, CString};
use std::os::raw::c_int;

use camino::Utf8Path;
use subprocess::{Exec, Redirection};

use super::Launcher;
use crate::call_tree::MAPPING_TABLE_SYMBOL;
use crate::sandbox::Status;
use crate::test_case::{Invocation, TestCase};
use crate::Result;

const RTLD_NOW: c_int = 2;

/// An open `dlopen` handle, closed on drop.
struct Handle(*mut c_void);

impl Handle {
    fn open(binary: &Utf8Path) -> Result<Handle> {
        let path = CString::new(binary.as_str())?;
        // SAFETY: `path` is a valid nul-terminated C string for the
        // duration of this call; the null-check below guards every later
        // use of the handle.
        let raw = unsafe { libc::dlopen(path.as_ptr(), RTLD_NOW) };
        if raw.is_null() {
            anyhow::bail!("dlopen {binary} failed");
        }
        Ok(Handle(raw))
    }

    fn symbol(&self, name: &str) -> Result<*mut c_void> {
        let symbol = CString::new(name)?;
        // SAFETY: `self.0` is a live handle from a successful `dlopen`.
        let sym = unsafe { libc::dlsym(self.0, symbol.as_ptr()) };
        if sym.is_null() {
            anyhow::bail!("symbol {name} not found");
        }
        Ok(sym)
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        // SAFETY: `self.0` was returned by a successful `dlopen` and is
        // closed exactly once, here.
        unsafe {
            libc::dlclose(self.0);
        }
    }
}

/// Calls the resolved symbol as the fixed ABI every compiled test entry
/// point exports: a C function taking no arguments and returning an
/// `int`, zero for pass — the same convention `sandbox::fork`'s shared
/// status word uses.
fn call_entry(handle: &Handle, entry_symbol: &str) -> Result<c_int> {
    let sym = handle.symbol(entry_symbol)?;
    // SAFETY: `sym` was just resolved from `handle` and is assumed by
    // convention to match `unsafe extern "C" fn() -> c_int`.
    let entry: unsafe extern "C" fn() -> c_int = unsafe { std::mem::transmute(sym) };
    Ok(unsafe { entry() })
}

/// `dlopen`s the compiled shared object once per call and calls its test
/// entry symbol directly, or spawns the named external program for a
/// custom test.
pub struct DlopenLauncher;

impl Launcher for DlopenLauncher {
    fn run_test(
        &self,
        binary: &Utf8Path,
        entry_symbol: &str,
        test: &TestCase,
        env_var: Option<&str>,
    ) -> Result<Status> {
        match &test.invocation {
            Invocation::Framework => {
                let _guard = env_var.map(EnvGuard::set);
                let handle = Handle::open(binary)?;
                let raw = call_entry(&handle, entry_symbol)?;
                Ok(if raw == 0 { Status::Passed } else { Status::Failed })
            }
            Invocation::Custom { program, argv } => {
                let mut exec = Exec::cmd(program)
                    .args(argv)
                    .stdout(Redirection::Pipe)
                    .stderr(Redirection::Merge);
                if let Some(var) = env_var {
                    exec = exec.env(var, "1");
                }
                let capture = exec
                    .capture()
                    .map_err(|e| anyhow::anyhow!("failed to spawn {program}: {e}"))?;
                Ok(if capture.success() { Status::Passed } else { Status::Failed })
            }
        }
    }

    fn run_for_mapping(
        &self,
        binary: &Utf8Path,
        entry_symbol: &str,
        _test: &TestCase,
        mapping_len: usize,
        dump_path: &Utf8Path,
    ) -> Result<()> {
        let handle = Handle::open(binary)?;
        // The mapping run only cares about the probe table the call
        // populates as a side effect, not whether the test itself passed.
        let _ = call_entry(&handle, entry_symbol)?;
        let table_ptr = handle.symbol(MAPPING_TABLE_SYMBOL)? as *const u64;
        // SAFETY: the binary's runtime-support object exports
        // `MAPPING_TABLE_SYMBOL` as a `mapping_len`-element `u64` array,
        // valid for as long as `handle` stays open.
        let mapping: Vec<u64> = unsafe { std::slice::from_raw_parts(table_ptr, mapping_len) }.to_vec();
        let mut bytes = Vec::with_capacity(mapping.len() * 8);
        for word in mapping {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        std::fs::write(dump_path, bytes)?;
        Ok(())
    }
}

/// Exports `var=1` for the lifetime of the guard and restores the
/// previous value on drop. Only used from inside a forked sandbox child,
/// which never shares environment state back with the parent driver.
struct EnvGuard {
    var: String,
    previous: Option<String>,
}

impl EnvGuard {
    fn set(var: &str) -> EnvGuard {
        let previous = std::env::var(var).ok();
        std::env::set_var(var, "1");
        EnvGuard { var: var.to_owned(), previous }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.previous {
            Some(value) => std::env::set_var(&self.var, value),
            None => std::env::remove_var(&self.var),
        }
    }
}
