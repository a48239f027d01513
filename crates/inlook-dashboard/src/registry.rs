use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{Error, Result};

pub trait RegistrySource: Send + Sync {
    fn implementations(&self, create_func: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Default)]
pub struct StaticRegistry {
    entries: BTreeMap<String, Vec<String>>,
    calls: AtomicUsize,
}

impl StaticRegistry {
    pub fn new(entries: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            entries,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn from_json(body: &str) -> Result<Self> {
        let entries: BTreeMap<String, Vec<String>> = serde_json::from_str(body)
            .map_err(|e| Error::msg(format!("invalid registry file: {e}")))?;
        Ok(Self::new(entries))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RegistrySource for StaticRegistry {
    fn implementations(&self, create_func: &str) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entries
            .get(create_func)
            .cloned()
            .ok_or_else(|| Error::msg(format!("no registry entry for '{create_func}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryStatus {
    NotStarted,
    Pending,
    Done(Vec<String>),
}

static NOT_STARTED: RegistryStatus = RegistryStatus::NotStarted;

struct RegistryEvent {
    plugin_type: String,
    outcome: Result<Vec<String>>,
}

pub struct RegistryCache {
    source: Arc<dyn RegistrySource>,
    entries: BTreeMap<String, RegistryStatus>,
    tx: mpsc::Sender<RegistryEvent>,
    rx: mpsc::Receiver<RegistryEvent>,
    fetches_started: usize,
}

impl RegistryCache {
    pub fn new(source: Arc<dyn RegistrySource>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            source,
            entries: BTreeMap::new(),
            tx,
            rx,
            fetches_started: 0,
        }
    }

    pub fn status(&self, plugin_type: &str) -> &RegistryStatus {
        self.entries.get(plugin_type).unwrap_or(&NOT_STARTED)
    }

    pub fn options(&self, plugin_type: &str) -> &[String] {
        match self.entries.get(plugin_type) {
            Some(RegistryStatus::Done(opts)) => opts.as_slice(),
            _ => &[],
        }
    }

    /// The request is keyed by the enclosing node's `create_func`, matching the
    /// backend endpoint; `plugin_type` only names the cache slot.
    pub fn request(&mut self, plugin_type: &str, create_func: &str) -> bool {
        if self.entries.contains_key(plugin_type) {
            return false;
        }
        self.entries
            .insert(plugin_type.to_string(), RegistryStatus::Pending);
        self.fetches_started += 1;

        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let slot = plugin_type.to_string();
        let key = create_func.to_string();
        debug!(plugin_type, create_func, "starting registry lookup");
        let spawned = thread::Builder::new()
            .name(format!("registry-{plugin_type}"))
            .spawn(move || {
                let outcome = source.implementations(&key);
                // The cache may be gone by now; late results are dropped.
                let _ = tx.send(RegistryEvent {
                    plugin_type: slot,
                    outcome,
                });
            });
        if let Err(e) = spawned {
            self.settle(
                plugin_type.to_string(),
                Err(Error::msg(format!("failed to spawn lookup thread: {e}"))),
            );
        }
        true
    }

    pub fn drain(&mut self) -> usize {
        let mut settled = 0;
        while let Ok(ev) = self.rx.try_recv() {
            self.settle(ev.plugin_type, ev.outcome);
            settled += 1;
        }
        settled
    }

    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.drain();
        while self.pending() > 0 {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return false;
            }
            match self.rx.recv_timeout(left) {
                Ok(ev) => self.settle(ev.plugin_type, ev.outcome),
                Err(_) => return false,
            }
        }
        true
    }

    pub fn pending(&self) -> usize {
        self.entries
            .values()
            .filter(|s| matches!(s, RegistryStatus::Pending))
            .count()
    }

    pub fn fetches_started(&self) -> usize {
        self.fetches_started
    }

    fn settle(&mut self, plugin_type: String, outcome: Result<Vec<String>>) {
        let options = match outcome {
            Ok(list) => {
                let list = dedup_in_order(list);
                debug!(plugin_type = %plugin_type, count = list.len(), "registry lookup done");
                list
            }
            Err(e) => {
                warn!(plugin_type = %plugin_type, error = %e, "registry lookup failed; field will have no options");
                Vec::new()
            }
        };
        self.entries
            .insert(plugin_type, RegistryStatus::Done(options));
    }
}

fn dedup_in_order(list: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    list.into_iter()
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::dedup_in_order;

    #[test]
    fn dedup_keeps_first_arrival() {
        let got = dedup_in_order(vec![
            "b".into(),
            "a".into(),
            "b".into(),
            "c".into(),
            "a".into(),
        ]);
        assert_eq!(got, vec!["b", "a", "c"]);
    }
}
