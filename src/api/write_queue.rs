//! # Deferred Write Queue
//!
//! Acumulador de mutaciones de caché pendientes, agrupadas por identidad de
//! request (id de mensaje/interacción).
//!
//! Resolution returns its result to the caller immediately; the cache writes
//! it produced are appended here and committed later, either when the request
//! finishes ([`WriteQueue::flush`]) or in bulk at shutdown
//! ([`WriteQueue::flush_all`]). Writes are best-effort: a failed task is
//! logged and dropped, never retried (at-most-once semantics).

use dashmap::DashMap;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use super::traits::{CacheRecord, GlobalCacheStore, LocalCacheStore};
use crate::query::Query;

/// Una mutación diferida de caché.
#[derive(Debug, Clone)]
pub enum WriteTask {
    /// Inserta una resolución nueva en la caché local.
    Insert(CacheRecord),
    /// Refresca el `last_fetched` de una entrada local existente.
    Update { query: String },
    /// Publica un envelope en la caché global compartida.
    PublishGlobal { response: Value, query: Query },
}

/// Tareas pendientes de una identidad, particionadas por etiqueta.
#[derive(Debug, Default)]
struct TaskBatch {
    inserts: Vec<CacheRecord>,
    updates: Vec<String>,
    publishes: Vec<(Value, Query)>,
}

impl TaskBatch {
    fn push(&mut self, task: WriteTask) {
        match task {
            WriteTask::Insert(record) => self.inserts.push(record),
            WriteTask::Update { query } => self.updates.push(query),
            WriteTask::PublishGlobal { response, query } => self.publishes.push((response, query)),
        }
    }

    fn merge(&mut self, other: TaskBatch) {
        self.inserts.extend(other.inserts);
        self.updates.extend(other.updates);
        self.publishes.extend(other.publishes);
    }

    fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.publishes.is_empty()
    }
}

/// Cola de escrituras diferidas con un único flush en vuelo.
///
/// Appends are lock-free (concurrent map keyed by request identity); the
/// flush path serializes on one process-wide async mutex. Write volume is
/// low relative to resolve volume, so simple correctness wins over flush
/// throughput here.
pub struct WriteQueue {
    batches: DashMap<u64, TaskBatch>,
    flush_lock: Mutex<()>,
    local: Arc<dyn LocalCacheStore>,
    global: Arc<dyn GlobalCacheStore>,
}

impl WriteQueue {
    pub fn new(local: Arc<dyn LocalCacheStore>, global: Arc<dyn GlobalCacheStore>) -> Self {
        Self {
            batches: DashMap::new(),
            flush_lock: Mutex::new(()),
            local,
            global,
        }
    }

    /// Añade una tarea al batch de la identidad, creándolo si hace falta.
    pub fn append(&self, request_id: u64, task: WriteTask) {
        self.batches.entry(request_id).or_default().push(task);
    }

    /// Número de identidades con tareas pendientes.
    pub fn pending_batches(&self) -> usize {
        self.batches.len()
    }

    /// Ejecuta y descarta el batch de una identidad.
    ///
    /// Una identidad ya drenada (o desconocida) es un no-op.
    pub async fn flush(&self, request_id: u64) {
        let _guard = self.flush_lock.lock().await;
        let Some((_, batch)) = self.batches.remove(&request_id) else {
            return;
        };
        trace!("Ejecutando escrituras diferidas de {}", request_id);
        self.dispatch(batch).await;
        trace!("Escrituras diferidas de {} completadas", request_id);
    }

    /// Drena todos los batches pendientes en una sola pasada.
    ///
    /// Usado al apagar para no perder escrituras en vuelo; las tareas de la
    /// misma etiqueta se concatenan entre identidades antes de despachar.
    pub async fn flush_all(&self) {
        let _guard = self.flush_lock.lock().await;
        trace!("Ejecutando todas las escrituras pendientes");

        let ids: Vec<u64> = self.batches.iter().map(|entry| *entry.key()).collect();
        let mut merged = TaskBatch::default();
        for id in ids {
            if let Some((_, batch)) = self.batches.remove(&id) {
                merged.merge(batch);
            }
        }

        if !merged.is_empty() {
            self.dispatch(merged).await;
        }
    }

    /// Despacha un batch contra los stores. Los fallos se registran y se
    /// descartan, nunca se reintentan ni se propagan.
    async fn dispatch(&self, batch: TaskBatch) {
        for record in batch.inserts {
            let query = record.query.clone();
            if let Err(exc) = self.local.insert(vec![record]).await {
                debug!("Fallo insertando {:?} en la caché local: {}", query, exc);
            }
        }

        for query in batch.updates {
            if let Err(exc) = self.local.update(&query).await {
                debug!("Fallo actualizando {:?} en la caché local: {}", query, exc);
            }
        }

        // Las publicaciones globales salen como grupo concurrente
        let publishes = batch
            .publishes
            .into_iter()
            .map(|(response, query)| self.global.update_global(response, query));
        for result in join_all(publishes).await {
            if let Err(exc) = result {
                debug!("Fallo publicando en la caché global: {}", exc);
            }
        }
    }
}
