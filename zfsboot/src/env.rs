//! Live loader variables
//!
//! A small environment table in the style of the loader's `env_setenv`:
//! each variable may carry a set hook and an unset hook that are called
//! instead of updating the table directly. Hooks receive the owning
//! context, so they can reach back into the store that mirrors the
//! variable. `EnvFlags::NOHOOK` skips them, which is how the store writes
//! its own values without recursing.

use crate::error::{Result, ZfsError};
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use bitflags::bitflags;

bitflags! {
    /// Variable flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EnvFlags: u32 {
        /// Value is owned by the table
        const VOLATILE = 1 << 1;
        /// Store the value without calling the variable's set hook
        const NOHOOK   = 1 << 2;
    }
}

/// Called by `setenv` instead of storing the value
pub type SetHook<C> = fn(&mut C, &str, &str) -> Result<()>;
/// Called by `unsetenv` before the variable is discarded
pub type UnsetHook<C> = fn(&mut C, &str) -> Result<()>;

/// Hook pair attached to a variable
pub struct EnvHooks<C> {
    pub set: SetHook<C>,
    pub unset: UnsetHook<C>,
}

impl<C> Clone for EnvHooks<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for EnvHooks<C> {}

/// One live variable
pub struct EnvVar<C> {
    pub name: String,
    pub value: String,
    pub flags: EnvFlags,
    hooks: Option<EnvHooks<C>>,
}

impl<C> EnvVar<C> {
    /// Does the variable carry hooks?
    pub fn has_hooks(&self) -> bool {
        self.hooks.is_some()
    }
}

/// Variable table
pub struct Environment<C> {
    vars: Vec<EnvVar<C>>,
}

impl<C> Default for Environment<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Environment<C> {
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    /// Look up a variable
    pub fn var(&self, name: &str) -> Option<&EnvVar<C>> {
        self.vars.iter().find(|v| v.name == name)
    }

    /// Value of a variable
    pub fn get(&self, name: &str) -> Option<&str> {
        self.var(name).map(|v| v.value.as_str())
    }

    /// Store a value without running hooks
    ///
    /// An existing variable keeps its hooks unless new ones are given.
    pub fn put(&mut self, name: &str, value: &str, flags: EnvFlags, hooks: Option<EnvHooks<C>>) {
        let flags = flags - EnvFlags::NOHOOK;
        match self.vars.iter_mut().find(|v| v.name == name) {
            Some(var) => {
                var.value = value.to_string();
                var.flags = flags;
                if hooks.is_some() {
                    var.hooks = hooks;
                }
            }
            None => self.vars.push(EnvVar {
                name: name.to_string(),
                value: value.to_string(),
                flags,
                hooks,
            }),
        }
    }

    /// Drop a variable without running hooks
    pub fn discard(&mut self, name: &str) -> bool {
        let before = self.vars.len();
        self.vars.retain(|v| v.name != name);
        self.vars.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnvVar<C>> {
        self.vars.iter()
    }
}

/// Owner of an environment table, handed to hooks
pub trait EnvContext: Sized {
    fn env(&self) -> &Environment<Self>;
    fn env_mut(&mut self) -> &mut Environment<Self>;
}

/// Set a variable, deferring to its set hook unless `NOHOOK` is given
pub fn setenv<C: EnvContext>(ctx: &mut C, name: &str, value: &str, flags: EnvFlags) -> Result<()> {
    if !flags.contains(EnvFlags::NOHOOK) {
        let hook = ctx.env().var(name).and_then(|v| v.hooks).map(|h| h.set);
        if let Some(set) = hook {
            return set(ctx, name, value);
        }
    }
    ctx.env_mut().put(name, value, flags, None);
    Ok(())
}

/// Remove a variable, running its unset hook first
///
/// A failing hook leaves the variable in place.
pub fn unsetenv<C: EnvContext>(ctx: &mut C, name: &str) -> Result<()> {
    let hooks = ctx.env().var(name).ok_or(ZfsError::NotFound)?.hooks;
    if let Some(hooks) = hooks {
        (hooks.unset)(ctx, name)?;
    }
    ctx.env_mut().discard(name);
    Ok(())
}
