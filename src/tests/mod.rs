//! Scenario tests for the engine
//!
//! These tests drive complete runs through realistic block graphs: fixed
//! chains, generate-and-test cycles, and blocks that recover after failing.
