use std::{
    fmt::{self, Debug, Formatter},
    pin::Pin,
    task::{Context, Poll},
};

use futures_core::{ready, Stream};
use pin_project_lite::pin_project;
use thiserror::Error;

use crate::{reader::ReadError, record::Record};

/// Sequence of decoded records handed to the reader by an external decoder.
///
/// Base-file and log-block binary parsing happen outside this crate; the
/// reader only consumes the resulting record streams.
pub type RecordStream = Pin<Box<dyn Stream<Item = Result<Record, SourceError>> + Send>>;

/// Decoder-side failure, positioned so the reader can name the offending
/// file and offset when it aborts the read.
#[derive(Debug, Error)]
#[error("{reason} (offset {offset})")]
pub struct SourceError {
    pub offset: u64,
    pub reason: String,
}

pin_project! {
    #[project = ScanStreamProject]
    pub enum ScanStream {
        Base {
            file: String,
            #[pin]
            inner: RecordStream,
        },
        Log {
            file: String,
            #[pin]
            inner: RecordStream,
        },
    }
}

impl ScanStream {
    pub(crate) fn base(file: String, inner: RecordStream) -> Self {
        ScanStream::Base { file, inner }
    }

    pub(crate) fn log(file: String, inner: RecordStream) -> Self {
        ScanStream::Log { file, inner }
    }
}

impl Debug for ScanStream {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScanStream::Base { file, .. } => write!(f, "ScanStream::Base({})", file),
            ScanStream::Log { file, .. } => write!(f, "ScanStream::Log({})", file),
        }
    }
}

impl Stream for ScanStream {
    type Item = Result<Record, ReadError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.project() {
            ScanStreamProject::Base { file, inner } => {
                Poll::Ready(ready!(inner.poll_next(cx)).map(|result| {
                    result.map_err(|source| ReadError::CorruptBaseFile {
                        file: file.clone(),
                        source,
                    })
                }))
            }
            ScanStreamProject::Log { file, inner } => {
                Poll::Ready(ready!(inner.poll_next(cx)).map(|result| {
                    result.map_err(|source| ReadError::CorruptLogBlock {
                        file: file.clone(),
                        source,
                    })
                }))
            }
        }
    }
}
