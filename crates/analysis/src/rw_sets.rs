//! Variables read and written by commands.

use std::collections::BTreeSet;

use crate::ir::{Command, CommandKind};
use crate::symbols::TypeInfo;

/// Variables a command may change.
///
/// A call writes its result variables and everything named in the callee's
/// modifies clauses.
pub fn written_vars(cmd: &Command, info: &dyn TypeInfo) -> BTreeSet<String> {
    match &cmd.kind {
        CommandKind::Assign(pairs) => pairs.iter().map(|(v, _)| v.clone()).collect(),
        CommandKind::Havoc(vars) => vars.iter().cloned().collect(),
        CommandKind::Call(call) => {
            let mut out: BTreeSet<String> = call.results.iter().cloned().collect();
            if let Some(sig) = info.signature_of(&call.callee) {
                out.extend(sig.modifies.iter().flatten().cloned());
            }
            out
        }
        CommandKind::Assert(_) | CommandKind::Assume(_) | CommandKind::Goto(_) | CommandKind::NoOp => {
            BTreeSet::new()
        }
    }
}

/// Variables a command's expressions mention.
pub fn read_vars(cmd: &Command) -> BTreeSet<String> {
    match &cmd.kind {
        CommandKind::Assert(e) | CommandKind::Assume(e) => e.free_vars(),
        CommandKind::Assign(pairs) => pairs.iter().flat_map(|(_, e)| e.free_vars()).collect(),
        CommandKind::Call(call) => call.args.iter().flat_map(|e| e.free_vars()).collect(),
        CommandKind::Havoc(_) | CommandKind::Goto(_) | CommandKind::NoOp => BTreeSet::new(),
    }
}
