// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by the ml and application layers:
//
//   checkpoint.rs - model weights via Burn's CompactRecorder
//                   (epoch{N}, epoch_best, encoder_best) and
//                   the JSON artifacts needed to rebuild the
//                   model (model_config.json, task_names.json)
//
//   metrics.rs    - multi-task ROC-AUC and the per-epoch
//                   metrics.csv logger
//
// Reference: Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// ROC-AUC and metrics CSV logger
pub mod metrics;
