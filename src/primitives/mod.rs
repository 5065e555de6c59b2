//! Native method implementations
//!
//! Every primitive has the [`PrimitiveFn`](crate::invokable::PrimitiveFn)
//! shape: it receives the receiver and the remaining arguments, already
//! checked against the selector's arity by the caller's stack discipline.

pub mod array;
pub mod block;
pub mod class;
pub mod number;
pub mod object;
pub mod string;
pub mod system;

use crate::error::VmError;
use crate::universe::Universe;
use crate::value::Value;

/// Install the primitive set into a freshly bootstrapped universe
pub fn install(universe: &mut Universe) -> Result<(), VmError> {
    object::install(universe);
    class::install(universe);
    number::install(universe);
    array::install(universe)?;
    string::install(universe);
    block::install(universe);
    system::install(universe);
    Ok(())
}

/// Argument `index` (receiver excluded)
pub(crate) fn arg<'a>(selector: &str, args: &'a [Value], index: usize) -> Result<&'a Value, VmError> {
    args.get(index)
        .ok_or_else(|| VmError::primitive(selector, format!("missing argument {}", index + 1)))
}

pub(crate) fn integer_arg(selector: &str, args: &[Value], index: usize) -> Result<i64, VmError> {
    let value = arg(selector, args, index)?;
    value
        .as_integer()
        .ok_or_else(|| VmError::primitive(selector, format!("expected an Integer, got {}", value.describe())))
}

/// Convert a 1-based language index into a 0-based one
pub(crate) fn one_based(selector: &str, index: i64, len: usize) -> Result<usize, VmError> {
    usize::try_from(index)
        .ok()
        .filter(|&i| i >= 1 && i <= len)
        .map(|i| i - 1)
        .ok_or_else(|| VmError::primitive(selector, format!("index {} out of bounds 1..{}", index, len)))
}
