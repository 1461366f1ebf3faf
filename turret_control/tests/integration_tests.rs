//! Integration tests for the turret control core.
//!
//! These tests assemble the full core on simulation drivers and a manual
//! clock, and drive it through the supervisory tick the way the binary does.

mod integration;
