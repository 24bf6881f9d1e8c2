//! Deterministic provider doubles for pipeline and server tests

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::routing::{post, MethodRouter};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, LlmProvider, SynthesisRequest};

/// Bag-of-words embedder: each word bumps one hashed bucket
///
/// Identical texts embed identically, so querying with a chunk's own text
/// scores it at 1.0.
pub struct HashEmbedder {
    dimensions: usize,
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimensions];
        for word in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            vector[(hasher.finish() as usize) % self.dimensions] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.trim().is_empty() {
            return Err(Error::embedding("cannot embed empty text"));
        }
        Ok(self.vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// How `FaultyEmbedder` misbehaves on its trigger text
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Return a provider error
    Fail,
    /// Never answer
    Hang,
    /// Answer with a vector of the wrong length
    WrongDimension,
}

/// Hash embedder that misbehaves on one exact text, or on every text
pub struct FaultyEmbedder {
    inner: HashEmbedder,
    trigger: Option<String>,
    fault: Fault,
}

impl FaultyEmbedder {
    pub fn new(dimensions: usize, trigger: impl Into<String>, fault: Fault) -> Self {
        Self {
            inner: HashEmbedder::new(dimensions),
            trigger: Some(trigger.into()),
            fault,
        }
    }

    pub fn always(dimensions: usize, fault: Fault) -> Self {
        Self {
            inner: HashEmbedder::new(dimensions),
            trigger: None,
            fault,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FaultyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.trigger.as_deref().is_some_and(|t| t != text) {
            return self.inner.embed(text).await;
        }
        match self.fault {
            Fault::Fail => Err(Error::embedding("quota exceeded")),
            Fault::Hang => std::future::pending().await,
            Fault::WrongDimension => Ok(vec![1.0; self.inner.dimensions + 1]),
        }
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "faulty"
    }
}

/// Owned copy of a synthesis request
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub system: String,
    pub context: String,
    pub question: String,
    pub max_tokens: usize,
}

/// LLM double that records requests and answers with a canned reply
pub struct RecordingLlm {
    reply: std::result::Result<String, String>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl RecordingLlm {
    pub fn answering(reply: impl Into<String>) -> Self {
        Self {
            reply: Ok(reply.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for RecordingLlm {
    async fn complete(&self, request: &SynthesisRequest<'_>) -> Result<String> {
        self.requests.lock().push(RecordedRequest {
            system: request.system.to_string(),
            context: request.context.to_string(),
            question: request.question.to_string(),
            max_tokens: request.max_tokens,
        });
        self.reply.clone().map_err(Error::synthesis)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.reply.is_ok())
    }

    fn name(&self) -> &str {
        "recording"
    }

    fn model(&self) -> &str {
        "canned"
    }
}

/// Single-page PDF showing `text` in a standard Type1 font
pub fn sample_pdf(text: &str) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Serve `router` on an ephemeral localhost port and return its base URL
pub async fn serve_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{}", addr)
}

/// POST handler answering with `replies` in turn, repeating the last one.
/// The counter records how many requests arrived.
pub fn scripted(replies: Vec<(StatusCode, Value)>) -> (MethodRouter, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let replies = Arc::new(replies);
    let route = post(move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        let replies = Arc::clone(&replies);
        async move {
            let (status, body) = replies[n.min(replies.len() - 1)].clone();
            (status, Json(body))
        }
    });
    (route, calls)
}
