use crate::error::{AppError, Result};
use crossbeam::queue::ArrayQueue;
use ndarray::Array2;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use std::cell::UnsafeCell;
use std::path::Path;
use std::sync::Arc;

/// A pool of ONNX Runtime sessions for the embedding model.
///
/// # Design
/// `Session::run` requires `&mut self`. Instead of serializing every request
/// behind a Mutex, the pool holds N independent sessions and hands each
/// caller an exclusive index through a lock-free queue.
///
/// # Safety
/// Each session index is held by at most one thread between
/// `acquire_session` and `release_session`; the ArrayQueue provides that
/// guarantee through atomic operations, which is what makes the UnsafeCell
/// access in `run_on_session` sound.
pub struct EmbeddingModel {
    sessions: Vec<UnsafeCell<Session>>,
    available: Arc<ArrayQueue<usize>>,
}

impl EmbeddingModel {
    /// Load `pool_size` sessions from one model file with Level3 optimization.
    pub fn load_pool(model_path: &Path, pool_size: usize, intra_threads: usize) -> Result<Self> {
        let pool_size = pool_size.max(1);

        // Read model file once
        let model_bytes = std::fs::read(model_path)
            .map_err(|e| AppError::ModelError(format!("Failed to read model file: {}", e)))?;

        let mut sessions = Vec::with_capacity(pool_size);
        let available = Arc::new(ArrayQueue::new(pool_size));

        for i in 0..pool_size {
            let session = Session::builder()
                .map_err(|e| AppError::ModelError(e.to_string()))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| AppError::ModelError(e.to_string()))?
                .with_intra_threads(intra_threads.max(1))
                .map_err(|e| AppError::ModelError(e.to_string()))?
                .commit_from_memory(&model_bytes)
                .map_err(|e: ort::Error| AppError::ModelError(e.to_string()))?;

            sessions.push(UnsafeCell::new(session));
            available
                .push(i)
                .map_err(|_| AppError::ModelError("Failed to initialize session pool".into()))?;
        }

        tracing::info!(
            path = %model_path.display(),
            pool_size,
            intra_threads,
            "ONNX session pool loaded successfully"
        );

        Ok(Self {
            sessions,
            available,
        })
    }

    fn acquire_session(&self) -> Result<usize> {
        self.available
            .pop()
            .ok_or_else(|| AppError::ResourceError("No available sessions in pool".into()))
    }

    fn release_session(&self, index: usize) {
        // Only indices taken from the queue come back, so this cannot overflow.
        let _ = self.available.push(index);
    }

    /// Run the model on a tokenized batch and return mean-pooled,
    /// L2-normalized sentence embeddings of shape (batch, hidden).
    pub fn embed(
        &self,
        input_ids: Array2<i64>,
        attention_mask: Array2<i64>,
        token_type_ids: Array2<i64>,
    ) -> Result<Array2<f32>> {
        let session_idx = self.acquire_session()?;

        let result = self.run_on_session(session_idx, input_ids, attention_mask, token_type_ids);

        // Always release the session back to the pool
        self.release_session(session_idx);

        result
    }

    fn run_on_session(
        &self,
        session_idx: usize,
        input_ids: Array2<i64>,
        attention_mask: Array2<i64>,
        token_type_ids: Array2<i64>,
    ) -> Result<Array2<f32>> {
        let batch_size = input_ids.nrows();
        let seq_len = input_ids.ncols();
        let shape = [batch_size, seq_len];

        let input_ids_vec: Vec<i64> = input_ids.iter().cloned().collect();
        let mask_vec: Vec<i64> = attention_mask.iter().cloned().collect();
        let token_type_vec: Vec<i64> = token_type_ids.iter().cloned().collect();

        let input_ids_tensor = Tensor::from_array((shape, input_ids_vec))
            .map_err(|e| AppError::ModelError(e.to_string()))?;
        let attention_mask_tensor = Tensor::from_array((shape, mask_vec))
            .map_err(|e| AppError::ModelError(e.to_string()))?;
        let token_type_ids_tensor = Tensor::from_array((shape, token_type_vec))
            .map_err(|e| AppError::ModelError(e.to_string()))?;

        // SAFETY: ArrayQueue guarantees exclusive access to this index.
        let session = unsafe { &mut *self.sessions[session_idx].get() };

        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor,
            ])
            .map_err(|e| AppError::ModelError(format!("Embedding inference failed: {}", e)))?;

        // last_hidden_state: (batch, seq_len, hidden_size)
        let hidden_state = outputs.get("last_hidden_state").ok_or_else(|| {
            AppError::ModelError("No 'last_hidden_state' output found".to_string())
        })?;

        let (shape_info, data) = hidden_state
            .try_extract_tensor::<f32>()
            .map_err(|e| AppError::ModelError(e.to_string()))?;

        if shape_info.len() != 3 {
            return Err(AppError::ModelError(format!(
                "Unexpected hidden state rank {}",
                shape_info.len()
            )));
        }
        let hidden_size = shape_info[2] as usize;

        let mut embeddings = mean_pool(data, &attention_mask, hidden_size);
        l2_normalize_rows(&mut embeddings);
        Ok(embeddings)
    }
}

/// Average token vectors over positions where the attention mask is set.
///
/// `hidden` is the flattened (batch, seq_len, hidden_size) output. Rows with
/// no attended tokens stay zero.
pub fn mean_pool(hidden: &[f32], attention_mask: &Array2<i64>, hidden_size: usize) -> Array2<f32> {
    let (batch_size, seq_len) = attention_mask.dim();
    let mut pooled = Array2::<f32>::zeros((batch_size, hidden_size));

    for i in 0..batch_size {
        let mut count = 0.0f32;
        let mut row = pooled.row_mut(i);

        for j in 0..seq_len {
            if attention_mask[[i, j]] == 1 {
                let base = (i * seq_len + j) * hidden_size;
                for (k, value) in row.iter_mut().enumerate() {
                    *value += hidden[base + k];
                }
                count += 1.0;
            }
        }

        if count > 0.0 {
            row.mapv_inplace(|v| v / count);
        }
    }

    pooled
}

/// Scale each row to unit Euclidean length; zero rows are left untouched.
pub fn l2_normalize_rows(matrix: &mut Array2<f32>) {
    for mut row in matrix.rows_mut() {
        let norm = row.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|v| v / norm);
        }
    }
}

// SAFETY: EmbeddingModel is Send + Sync because every UnsafeCell<Session> is
// reached only through an index popped from the ArrayQueue, which hands each
// index to at most one caller until it is pushed back.
unsafe impl Send for EmbeddingModel {}
unsafe impl Sync for EmbeddingModel {}
