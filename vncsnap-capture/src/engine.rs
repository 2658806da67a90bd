//! The capture engine: connect, handshake, request, await, decode.

use crate::error::{CaptureError, Step};
use crate::frame::FrameGrid;
use crate::HostAddress;
use rfb_wire::{
    handshake, FramebufferUpdateRequest, PixelFormat, RectanglePayload, ServerMessage,
    SetEncodings, SetPixelFormat, WireReader, WireWriter, ENCODING_RAW,
};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// Per-step time budget for a capture attempt.
///
/// Each of the four suspension points (connect, handshake, request,
/// response wait) races its own timer of this length, so a dead peer
/// costs at most four slices. The 10s default is scanning policy, not a
/// protocol constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepBudget {
    pub per_step: Duration,
}

impl StepBudget {
    pub fn new(per_step: Duration) -> Self {
        Self { per_step }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }
}

impl Default for StepBudget {
    fn default() -> Self {
        Self::from_secs(10)
    }
}

/// Race a step against its timer, mapping the inner I/O error through
/// `wrap` and an elapsed timer to [`CaptureError::Timeout`].
async fn bounded<T, F>(
    step: Step,
    budget: Duration,
    fut: F,
    wrap: fn(std::io::Error) -> CaptureError,
) -> Result<T, CaptureError>
where
    F: Future<Output = std::io::Result<T>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(wrap(e)),
        Err(_) => Err(CaptureError::Timeout { step, budget }),
    }
}

/// Capture one frame from `addr`.
///
/// Runs connect → handshake (shared session, force RGB888, raw-only
/// encodings) → one non-incremental full-frame update request → a single
/// bounded wait for the update → raw decode of its first rectangle.
///
/// The TCP connection lives inside this call and is closed by drop on
/// every path out, success or failure. A session that fails produces no
/// frame at all; there are no partial results.
pub async fn capture(addr: &HostAddress, budget: StepBudget) -> Result<FrameGrid, CaptureError> {
    let per_step = budget.per_step;

    let stream = bounded(
        Step::Connect,
        per_step,
        TcpStream::connect((addr.ip.as_str(), addr.port)),
        CaptureError::Connect,
    )
    .await?;
    stream.set_nodelay(true).map_err(CaptureError::Connect)?;

    let (read_half, write_half) = stream.into_split();
    let mut reader = WireReader::new(read_half);
    let mut writer = WireWriter::new(write_half);

    let format = PixelFormat::rgb888();
    let init = bounded(
        Step::Handshake,
        per_step,
        async {
            let init = handshake(&mut reader, &mut writer, true).await?;
            // Pin the session to our canonical format and declare that
            // raw is the only encoding we will accept.
            SetPixelFormat {
                pixel_format: format.clone(),
            }
            .write_to(&mut writer);
            SetEncodings {
                encodings: vec![ENCODING_RAW],
            }
            .write_to(&mut writer);
            writer.flush().await?;
            Ok(init)
        },
        CaptureError::Handshake,
    )
    .await?;
    debug!(
        host = %addr,
        width = init.width,
        height = init.height,
        name = %init.name,
        "session established"
    );

    bounded(
        Step::Request,
        per_step,
        async {
            FramebufferUpdateRequest {
                incremental: false,
                x: 0,
                y: 0,
                width: init.width,
                height: init.height,
            }
            .write_to(&mut writer);
            writer.flush().await
        },
        CaptureError::Request,
    )
    .await?;

    // One bounded wait for the update; other message variants are
    // consumed and skipped rather than treated as protocol errors.
    let update = match tokio::time::timeout(per_step, async {
        loop {
            match ServerMessage::read_from(&mut reader, &format).await? {
                ServerMessage::FramebufferUpdate(update) => {
                    return Ok::<_, std::io::Error>(update)
                }
                other => trace!(host = %addr, message = ?other, "skipping non-update message"),
            }
        }
    })
    .await
    {
        Ok(Ok(update)) => update,
        Ok(Err(e)) => {
            return Err(CaptureError::Decode(format!("while awaiting update: {}", e)));
        }
        Err(_) => {
            return Err(CaptureError::Timeout {
                step: Step::Response,
                budget: per_step,
            });
        }
    };

    // Only the first rectangle is consulted; this engine does not
    // composite partial updates.
    let rect = update
        .rectangles
        .first()
        .ok_or_else(|| CaptureError::Decode("update carried no rectangles".into()))?;

    match &rect.payload {
        RectanglePayload::Raw(bytes) => {
            FrameGrid::decode_raw(rect.width, rect.height, &format, bytes)
        }
        RectanglePayload::Unsupported(encoding) => Err(CaptureError::Decode(format!(
            "server sent unsupported encoding {}",
            encoding
        ))),
    }
}
