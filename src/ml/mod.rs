// ============================================================
// Layer 5 - ML / Model Layer (Burn)
// ============================================================
// Everything that builds, trains or runs the network.
//
//   graph_wrapper.rs - JoinGraph → GraphFeed<B> tensors
//                      (adds self-loop edges)
//
//   model.rs         - GIN encoder, graph pooling, task head,
//                      masked BCE-with-logits loss
//
//   trainer.rs       - finetuning loop: Adam, per-epoch
//                      valid/test ROC-AUC, checkpoint per epoch,
//                      best-validation selection
//
//   inferencer.rs    - loads epoch_best and predicts task
//                      probabilities
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Join graph to Burn tensors
pub mod graph_wrapper;

/// GIN property model
pub mod model;

/// Finetuning loop with validation and checkpointing
pub mod trainer;

/// Loads the best checkpoint and predicts probabilities
pub mod inferencer;
