// src/privilege/mod.rs

//! Privilege gate for registry mutations
//!
//! When the caller cannot write the registry but holds an RBAC grant for the
//! `prodreg` CLI, the mutation is handed to `pfexec prodreg ...` with an
//! argument vector that encodes it exactly. The CLI exits with the POSIX
//! convention; the gate reports the legacy convention where zero means
//! failure.

mod argv;
mod authorizer;
mod escape;
mod launcher;

pub use argv::{
    RegisterArgs, decode_pair, decode_ref, encode_ref, register_args, unregister_args,
};
pub use authorizer::{
    Authorizer, ExecAttrAuthorizer, FixedAuthorizer, profiles_grant, user_profiles,
};
pub use escape::{escape, join_braced, split_braced, unescape};
pub use launcher::{EXEC_FAILED, Launcher, ProcessLauncher, RecordingLauncher};

use crate::config::Context;
use crate::error::Result;
use tracing::info;

/// Map a POSIX exit status onto the legacy library convention
pub fn invert_exit_code(code: i32) -> i32 {
    if code == 0 { 1 } else { 0 }
}

/// Re-invokes the CLI under the authorization-elevating helper
pub struct PrivilegeGate<'a> {
    ctx: &'a Context,
}

impl<'a> PrivilegeGate<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// True when the caller may use the gate at all
    pub fn available(&self) -> bool {
        self.ctx.authorizer.has_grant()
    }

    /// Full argument vector for a CLI invocation
    pub fn command_line(&self, args: &[String]) -> Vec<String> {
        let config = &self.ctx.config;
        let mut argv = Vec::with_capacity(args.len() + 2);
        argv.push(config.pfexec_path.to_string_lossy().into_owned());
        argv.push(config.prodreg_path.to_string_lossy().into_owned());
        argv.extend(args.iter().cloned());
        argv
    }

    /// Run the CLI and return the inverted exit status
    pub fn invoke(&self, args: &[String]) -> Result<i32> {
        let argv = self.command_line(args);
        info!("Delegating to privileged helper: {}", argv.join(" "));
        let code = self.ctx.launcher.launch(&argv)?;
        if code == EXEC_FAILED {
            info!("Privileged helper could not be executed");
        }
        Ok(invert_exit_code(code))
    }
}
