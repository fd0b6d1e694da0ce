/*
 * egui front end: the app loop, the graph canvas and the floating node inspector.
 */

pub mod app;
pub mod canvas;
pub mod inspector_panel;
