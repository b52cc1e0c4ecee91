// src/ui/widgets/mod.rs

// One module per dashboard panel.
pub mod footer; // Progress gauge and key hint.
pub mod header; // Target, stage and elapsed time.
pub mod intel; // Pipeline checklist, security score, stack.
pub mod log_view; // Session activity log.
