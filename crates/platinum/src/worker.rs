//! Dedicated codec thread.
//!
//! All decoding and encoding submitted through a [`CodecWorker`] runs on one
//! background thread, in submission order. Every request gets a unique id;
//! the reply carries the same id so callers waiting on several [`Ticket`]s
//! receive their own result no matter which one they wait on first.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex, MutexGuard};
use platinum_common::ByteSource;

use crate::{Error, Extracted, Extractor, FileNode, Result};

/// Work for the codec thread.
#[derive(Debug)]
pub enum Request {
    /// Decode a top-level source.
    Extract(ByteSource),
    /// Resolve a partial leaf; non-partial nodes come back unchanged.
    ExtractPartial(FileNode),
    /// Encode an extracted source back into bytes.
    Repack(Extracted),
}

/// Result of a [`Request`], in the same order as its variants.
#[derive(Debug)]
pub enum Response {
    Extracted(Extracted),
    Resolved(FileNode),
    Repacked(Vec<u8>),
}

struct Envelope {
    id: u64,
    request: Request,
}

struct Reply {
    id: u64,
    result: Result<Response>,
}

/// Replies received on behalf of other tickets.
#[derive(Default)]
struct Mailbox {
    stash: HashMap<u64, Result<Response>>,
    /// Tickets dropped before their reply arrived; the reply is discarded.
    abandoned: HashSet<u64>,
    receiving: bool,
}

struct Shared {
    mailbox: Mutex<Mailbox>,
    changed: Condvar,
    replies: Receiver<Reply>,
}

/// A pending request. Dropping it without waiting discards the reply.
#[must_use = "a ticket does nothing unless waited on"]
pub struct Ticket {
    id: u64,
    shared: Arc<Shared>,
    done: bool,
}

impl Ticket {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Block until the reply for this request arrives.
    ///
    /// One waiter at a time reads the reply channel; replies addressed to
    /// other tickets are stashed for them.
    pub fn wait(mut self) -> Result<Response> {
        let result = self.receive();
        self.done = true;
        result
    }

    fn receive(&self) -> Result<Response> {
        let shared = &self.shared;
        let mut mailbox = shared.mailbox.lock();
        loop {
            if let Some(result) = mailbox.stash.remove(&self.id) {
                return result;
            }
            if mailbox.receiving {
                shared.changed.wait(&mut mailbox);
                continue;
            }

            mailbox.receiving = true;
            let received = MutexGuard::unlocked(&mut mailbox, || shared.replies.recv());
            mailbox.receiving = false;
            shared.changed.notify_all();

            match received {
                Ok(reply) if reply.id == self.id => return reply.result,
                Ok(reply) => {
                    if !mailbox.abandoned.remove(&reply.id) {
                        mailbox.stash.insert(reply.id, reply.result);
                    }
                }
                Err(_) => return Err(Error::WorkerGone),
            }
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let mut mailbox = self.shared.mailbox.lock();
        if mailbox.stash.remove(&self.id).is_none() {
            mailbox.abandoned.insert(self.id);
        }
    }
}

/// Handle to the codec thread. Dropping it stops the thread after the
/// queued requests are processed.
pub struct CodecWorker {
    requests: Option<Sender<Envelope>>,
    shared: Arc<Shared>,
    next_id: AtomicU64,
    handle: Option<JoinHandle<()>>,
}

impl CodecWorker {
    /// Start the codec thread.
    pub fn spawn(extractor: Extractor) -> Result<Self> {
        let (request_tx, request_rx) = unbounded::<Envelope>();
        let (reply_tx, reply_rx) = unbounded::<Reply>();

        let handle = thread::Builder::new()
            .name("platinum-codec".to_string())
            .spawn(move || run(extractor, request_rx, reply_tx))?;

        Ok(Self {
            requests: Some(request_tx),
            shared: Arc::new(Shared {
                mailbox: Mutex::new(Mailbox::default()),
                changed: Condvar::new(),
                replies: reply_rx,
            }),
            next_id: AtomicU64::new(0),
            handle: Some(handle),
        })
    }

    /// Queue a request without waiting for it.
    pub fn submit(&self, request: Request) -> Result<Ticket> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.requests
            .as_ref()
            .ok_or(Error::WorkerGone)?
            .send(Envelope { id, request })
            .map_err(|_| Error::WorkerGone)?;
        Ok(Ticket {
            id,
            shared: self.shared.clone(),
            done: false,
        })
    }

    pub fn extract(&self, source: ByteSource) -> Result<Extracted> {
        match self.submit(Request::Extract(source))?.wait()? {
            Response::Extracted(extracted) => Ok(extracted),
            other => unreachable!("extract answered with {:?}", other),
        }
    }

    pub fn extract_partial(&self, node: FileNode) -> Result<FileNode> {
        match self.submit(Request::ExtractPartial(node))?.wait()? {
            Response::Resolved(node) => Ok(node),
            other => unreachable!("extract_partial answered with {:?}", other),
        }
    }

    pub fn repack(&self, extracted: Extracted) -> Result<Vec<u8>> {
        match self.submit(Request::Repack(extracted))?.wait()? {
            Response::Repacked(bytes) => Ok(bytes),
            other => unreachable!("repack answered with {:?}", other),
        }
    }
}

impl Drop for CodecWorker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("codec worker panicked");
            }
        }
    }
}

fn run(extractor: Extractor, requests: Receiver<Envelope>, replies: Sender<Reply>) {
    log::debug!("codec worker started");
    for Envelope { id, request } in requests {
        let result = handle(&extractor, request);
        if replies.send(Reply { id, result }).is_err() {
            break;
        }
    }
    log::debug!("codec worker stopped");
}

fn handle(extractor: &Extractor, request: Request) -> Result<Response> {
    match request {
        Request::Extract(source) => extractor.extract(source).map(Response::Extracted),
        Request::ExtractPartial(mut node) => {
            extractor.extract_partial(&mut node)?;
            Ok(Response::Resolved(node))
        }
        Request::Repack(extracted) => extractor.repack_extracted(&extracted).map(Response::Repacked),
    }
}

#[cfg(test)]
mod tests {
    use platinum_dat::DatFile;
    use platinum_pkz::{CompressionAlgorithm, Decompressors, PkzFile, RepackOptions};

    use super::*;
    use crate::ErrorKind;

    fn dat_source(name: &str, files: &[(&str, &[u8])]) -> ByteSource {
        let files: Vec<DatFile> = files.iter().map(|(n, d)| DatFile::new(*n, d.to_vec())).collect();
        ByteSource::from_bytes(name, platinum_dat::encode(&files).unwrap())
    }

    #[test]
    fn test_ids_are_unique() {
        let worker = CodecWorker::spawn(Extractor::default()).unwrap();
        let a = worker.submit(Request::Extract(dat_source("a.dat", &[("a", b"1")]))).unwrap();
        let b = worker.submit(Request::Extract(dat_source("b.dat", &[("b", b"2")]))).unwrap();
        assert_ne!(a.id(), b.id());
        a.wait().unwrap();
        b.wait().unwrap();
    }

    #[test]
    fn test_replies_match_tickets_out_of_order() {
        let worker = CodecWorker::spawn(Extractor::default()).unwrap();
        let first = worker.submit(Request::Extract(dat_source("first.dat", &[("x", b"1")]))).unwrap();
        let second = worker.submit(Request::Extract(dat_source("second.dat", &[("y", b"2")]))).unwrap();
        let third = worker
            .submit(Request::Extract(ByteSource::from_bytes("bad.zzz", b"XXXX".to_vec())))
            .unwrap();

        match third.wait() {
            Err(e) => assert_eq!(e.kind(), ErrorKind::UnsupportedFormat),
            Ok(other) => panic!("unexpected reply {:?}", other),
        }
        match second.wait().unwrap() {
            Response::Extracted(extracted) => assert_eq!(extracted.name, "second.dat"),
            other => panic!("unexpected reply {:?}", other),
        }
        match first.wait().unwrap() {
            Response::Extracted(extracted) => assert_eq!(extracted.name, "first.dat"),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_dropped_ticket_reply_is_discarded() {
        let worker = CodecWorker::spawn(Extractor::default()).unwrap();
        let dropped = worker.submit(Request::Extract(dat_source("a.dat", &[("a", b"1")]))).unwrap();
        drop(dropped);

        // Replies come back in order, so this wait reads the dropped one first.
        let kept = worker.submit(Request::Extract(dat_source("b.dat", &[("b", b"2")]))).unwrap();
        kept.wait().unwrap();

        let mailbox = worker.shared.mailbox.lock();
        assert!(mailbox.stash.is_empty());
        assert!(mailbox.abandoned.is_empty());
    }

    #[test]
    fn test_dropped_ticket_clears_stash() {
        let worker = CodecWorker::spawn(Extractor::default()).unwrap();
        let first = worker.submit(Request::Extract(dat_source("a.dat", &[("a", b"1")]))).unwrap();
        let second = worker.submit(Request::Extract(dat_source("b.dat", &[("b", b"2")]))).unwrap();
        second.wait().unwrap();
        assert_eq!(worker.shared.mailbox.lock().stash.len(), 1);

        drop(first);
        let mailbox = worker.shared.mailbox.lock();
        assert!(mailbox.stash.is_empty());
        assert!(mailbox.abandoned.is_empty());
    }

    #[test]
    fn test_concurrent_callers() {
        let worker = Arc::new(CodecWorker::spawn(Extractor::default()).unwrap());
        let threads: Vec<_> = (0..4)
            .map(|i| {
                let worker = worker.clone();
                thread::spawn(move || {
                    let name = format!("{}.dat", i);
                    let extracted = worker.extract(dat_source(&name, &[("f", b"data")])).unwrap();
                    assert_eq!(extracted.name, name);
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
    }

    #[test]
    fn test_partial_and_repack_round_trip() {
        let files = vec![PkzFile::new("a.txt", b"alpha".to_vec(), CompressionAlgorithm::ZStandard)];
        let bytes = platinum_pkz::encode(&files, &Decompressors::new(), &RepackOptions::default()).unwrap();

        let worker = CodecWorker::spawn(Extractor::default()).unwrap();
        let mut extracted = worker.extract(ByteSource::from_bytes("a.pkz", bytes)).unwrap();
        assert!(extracted.has_partial_files());

        let partial = extracted.find("a.pkz/a.txt").unwrap().clone();
        let resolved = worker.extract_partial(partial).unwrap();
        assert!(!resolved.is_partial());
        assert_eq!(resolved.name(), "a.txt");

        let unchanged = worker.extract_partial(resolved.clone()).unwrap();
        assert_eq!(unchanged.name(), resolved.name());
        assert!(!unchanged.is_partial());

        *extracted.find_mut("a.pkz/a.txt").unwrap() = resolved;
        let repacked = worker.repack(extracted).unwrap();
        let again = worker.extract(ByteSource::from_bytes("b.pkz", repacked)).unwrap();
        assert_eq!(again.partial_count(), 1);
    }
}
