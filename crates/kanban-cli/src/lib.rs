//! Kanban CLI library.
//!
//! Command-line front end for the contact board: lists the attributes a
//! board can be built from, prints boards and single stages, and moves
//! contacts between stages.

pub mod cli;
pub mod commands;
