//! Static cascade allow-list.
//!
//! Every derived event must be of a type declared reachable from its
//! parent's type. The table below is the complete cascade surface of the
//! engine; a handler emitting anything outside it is a programming error
//! and aborts the whole edit before any patch applies.
//!
//! | parent            | may derive                    |
//! |-------------------|-------------------------------|
//! | add-node          | add-connector                 |
//! | remove-node       | remove-connector              |
//! | remove-connector  | remove-edge                   |
//! | connect-edge      | remove-edge, update-connector |
//! | remove-edge       | update-connector              |
//! | everything else   | (nothing)                     |
//!
//! The table is acyclic, so cascades terminate by construction.

use super::event::EditEventKind;

/// Event kinds legally derivable from `parent`.
#[must_use]
pub fn allowed_children(parent: EditEventKind) -> &'static [EditEventKind] {
    use EditEventKind::*;
    match parent {
        AddNode => &[AddConnector],
        RemoveNode => &[RemoveConnector],
        RemoveConnector => &[RemoveEdge],
        ConnectEdge => &[RemoveEdge, UpdateConnector],
        RemoveEdge => &[UpdateConnector],
        AddConnector | UpdateConnector | UpdateNodeConfig | MoveNode | SetLiveValue
        | SetColumnBinding => &[],
    }
}

/// Whether `child` may be derived from `parent`.
#[must_use]
pub fn is_allowed(parent: EditEventKind, child: EditEventKind) -> bool {
    allowed_children(parent).contains(&child)
}
