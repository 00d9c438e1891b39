use crate::basic_types::Lin;

/// A tableau row: the defining equation `x_i = expr` of a basic variable,
/// where `expr` is over nonbasic variables only.
#[derive(Debug, Clone)]
pub(crate) struct Row {
    pub(crate) expr: Lin,
}
