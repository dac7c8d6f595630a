//! Contract desugaring for the routine being verified.
//!
//! Preconditions become assumptions at the entry. Postconditions become
//! assertions in an exit block that every return jumps to.

use std::collections::HashMap;

use crate::desugar::DesugarError;
use crate::ir::{Body, Command, CommandKind, Expr, Procedure, Routine};

/// Label of the synthetic exit block.
pub const EXIT_LABEL: &str = "$$exit";

/// Inline `sig`'s pre- and postconditions into `routine`'s body.
///
/// The procedure's formals are renamed positionally to the routine's.
pub fn desugar_specification(routine: &Routine, sig: &Procedure) -> Result<Routine, DesugarError> {
    if sig.requires.is_empty() && sig.ensures.is_empty() {
        return Ok(routine.clone());
    }
    let subst = formal_renaming(routine, sig)?;

    let mut commands: Vec<Command> = sig
        .requires
        .iter()
        .map(|pre| Command::assume(pre.substitute(&subst)))
        .collect();

    let has_exit = !sig.ensures.is_empty();
    for cmd in routine.body.iter() {
        match &cmd.kind {
            CommandKind::Goto(targets) if targets.is_empty() && has_exit => {
                commands.push(Command {
                    labels: cmd.labels.clone(),
                    kind: CommandKind::Goto(vec![EXIT_LABEL.to_string()]),
                });
            }
            _ => commands.push(cmd.clone()),
        }
    }

    for (i, post) in sig.ensures.iter().enumerate() {
        let mut cmd = Command::assert(post.substitute(&subst));
        if i == 0 {
            cmd.labels.push(EXIT_LABEL.to_string());
        }
        commands.push(cmd);
    }

    Ok(Routine {
        body: Body::new(commands),
        ..routine.clone()
    })
}

fn formal_renaming(
    routine: &Routine,
    sig: &Procedure,
) -> Result<HashMap<String, Expr>, DesugarError> {
    for (what, expected, found) in [
        ("arguments", sig.args.len(), routine.args.len()),
        ("results", sig.results.len(), routine.results.len()),
    ] {
        if expected != found {
            return Err(DesugarError::ArityMismatch {
                callee: sig.name.clone(),
                what,
                expected,
                found,
            });
        }
    }
    Ok(sig
        .args
        .iter()
        .zip(&routine.args)
        .chain(sig.results.iter().zip(&routine.results))
        .filter(|(formal, actual)| formal.name != actual.name)
        .map(|(formal, actual)| (formal.name.clone(), Expr::Var(actual.name.clone())))
        .collect())
}
