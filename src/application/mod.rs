// ============================================================
// Layer 2 - Application / Use Cases
// ============================================================
// Workflow coordination only: each use case calls into the
// data, ml and infra layers in order and returns a summary.
// No model math and no printing here.

/// Finetune a GIN on a MoleculeNet dataset
pub mod finetune_use_case;

/// Predict task probabilities with a finetuned model
pub mod predict_use_case;
