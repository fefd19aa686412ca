// Copyright 2021 - 2025 Martin Pool

//! The host compiler/linker toolchain (`spec.md` §1: "only the 'compile
//! module → object file' and 'link object files → executable' operations
//! are consumed"). This crate never embeds a compiler; `ShellToolchain`
//! just shells out to whatever `cc`-compatible driver and linker are on
//! `PATH`, the way the teacher crate shells out to `cargo`/`rustc`.

use camino::{Utf8Path, Utf8PathBuf};
use subprocess::{Exec, Redirection};

use crate::Result;

/// Compiles one already-materialized module to an object file, and links
/// a set of object files into an executable. Strict mode (`spec.md`
/// §7, `Config::strict`) controls whether a non-zero exit from either
/// step is fatal to the whole run or just to the one module/mutant that
/// failed to build.
pub trait Toolchain: Send + Sync {
    fn compile(&self, source_object_path: &Utf8Path, output_path: &Utf8Path) -> Result<()>;
    fn link(&self, object_paths: &[Utf8PathBuf], output_path: &Utf8Path) -> Result<()>;
}

/// Shells out to a `cc`-compatible compiler driver via the `subprocess`
/// crate, the same mechanism the teacher crate uses for running
/// `cargo`/`rustc` as a child process.
pub struct ShellToolchain {
    pub compiler: String,
    pub linker: String,
    pub extra_compile_args: Vec<String>,
    pub extra_link_args: Vec<String>,
}

impl Default for ShellToolchain {
    fn default() -> ShellToolchain {
        ShellToolchain {
            compiler: std::env::var("CC").unwrap_or_else(|_| "cc".to_owned()),
            linker: std::env::var("CC").unwrap_or_else(|_| "cc".to_owned()),
            extra_compile_args: Vec::new(),
            extra_link_args: Vec::new(),
        }
    }
}

fn run(mut exec: Exec, description: &str) -> Result<()> {
    exec = exec.stdout(Redirection::Pipe).stderr(Redirection::Merge);
    let capture = exec
        .capture()
        .map_err(|e| anyhow::anyhow!("failed to spawn {description}: {e}"))?;
    if !capture.success() {
        anyhow::bail!(
            "{description} failed:\n{}",
            capture.stdout_str()
        );
    }
    Ok(())
}

impl Toolchain for ShellToolchain {
    fn compile(&self, source_object_path: &Utf8Path, output_path: &Utf8Path) -> Result<()> {
        let exec = Exec::cmd(&self.compiler)
            .arg("-c")
            .arg(source_object_path.as_str())
            .arg("-o")
            .arg(output_path.as_str())
            .args(&self.extra_compile_args);
        run(exec, &format!("compiling {source_object_path}"))
    }

    fn link(&self, object_paths: &[Utf8PathBuf], output_path: &Utf8Path) -> Result<()> {
        let exec = Exec::cmd(&self.linker)
            .args(&object_paths.iter().map(Utf8PathBuf::as_str).collect::<Vec<_>>())
            .arg("-o")
            .arg(output_path.as_str())
            .args(&self.extra_link_args);
        run(exec, &format!("linking {output_path}"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_toolchain_honors_cc_env_var() {
        crate::test_util::single_threaded_set_env_var("CC", "my-cc");
        let toolchain = ShellToolchain::default();
        assert_eq!(toolchain.compiler, "my-cc");
        crate::test_util::single_threaded_remove_env_var("CC");
    }
}
