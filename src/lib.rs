// ==============================================================================
// lib.rs - MR Instrument Generator Library
// ==============================================================================
// Description: Library interface for Mendelian-randomization instrument
//              generation from GWAS summary statistics
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

pub mod parsers;
pub mod models;
pub mod config;
pub mod standardize;
pub mod reference_panel;
pub mod preprocess;
pub mod clump;
pub mod harmonize;
pub mod backend;
pub mod merge;
pub mod validator;
pub mod output;
pub mod report;
pub mod processor;
