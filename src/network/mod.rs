/*
 * This module defines the peer/edge model shared by the store and the GUI,
 * and the layout graph the simulation runs on.
 */

pub mod edge;
pub mod layout_graph;
pub mod peer;
