/*
 * This module provides data aquisition abilites for the application.
 * It doesn't care what the peers report, just how to reach them.
 */

pub mod http;
