//! The request loop: pulls voice clips from the transport, runs each through
//! the pipeline on its own task, and sends exactly one reply per clip.

use crate::defaults;
use crate::pipeline::{Outcome, Pipeline};
use crate::transport::{Delivery, IncomingClip, ReplyTarget, Transport};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Maps a pipeline outcome to the single reply it produces.
fn delivery_for(outcome: Outcome) -> Delivery {
    match outcome {
        Outcome::Delivered(artifact) => Delivery::Document {
            filename: artifact.filename,
            bytes: artifact.bytes,
        },
        Outcome::NotFound => Delivery::Text(defaults::NOT_FOUND_REPLY.to_string()),
        Outcome::Error(_) => Delivery::Text(defaults::FAILURE_REPLY.to_string()),
    }
}

/// One turn of the serve loop: either a new clip arrived or a finished
/// invocation produced its reply.
enum Event {
    Clip(Option<IncomingClip>),
    Reply(ReplyTarget, Delivery),
    TransportFailed(crate::error::BergvoxError),
}

/// Run the service until the transport closes: one spawned task per clip,
/// replies funneled back through the loop so the transport is driven from a
/// single place.
pub async fn serve<T: Transport>(
    mut transport: T,
    pipeline: Arc<Pipeline>,
) -> crate::error::Result<()> {
    let (outbox_tx, mut outbox_rx) = mpsc::channel::<(ReplyTarget, Delivery)>(32);
    let mut in_flight: usize = 0;
    let mut draining = false;

    loop {
        // The select arms only classify what happened; the transport is
        // touched afterwards, once the next_clip future is gone.
        let event = if draining {
            match outbox_rx.recv().await {
                Some((to, delivery)) => Event::Reply(to, delivery),
                // The loop holds a sender, so this arm is unreachable.
                None => return Ok(()),
            }
        } else {
            tokio::select! {
                incoming = transport.next_clip() => match incoming {
                    Ok(clip) => Event::Clip(clip),
                    Err(e) => Event::TransportFailed(e),
                },
                reply = outbox_rx.recv() => match reply {
                    Some((to, delivery)) => Event::Reply(to, delivery),
                    None => continue,
                },
            }
        };

        match event {
            Event::Clip(Some(incoming)) => {
                in_flight += 1;
                let pipeline = Arc::clone(&pipeline);
                let outbox = outbox_tx.clone();
                tokio::spawn(async move {
                    let outcome = pipeline.run(incoming.clip).await;
                    let delivery = delivery_for(outcome);
                    if outbox.send((incoming.reply, delivery)).await.is_err() {
                        warn!("reply dropped: service loop already stopped");
                    }
                });
            }
            Event::Clip(None) => {
                info!("transport closed, draining in-flight clips");
                draining = true;
            }
            Event::Reply(to, delivery) => {
                in_flight = in_flight.saturating_sub(1);
                if let Err(e) = transport.deliver(&to, delivery).await {
                    warn!(error = %e, "reply delivery failed");
                }
            }
            Event::TransportFailed(e) => {
                error!(error = %e, "transport receive failed");
                return Err(e);
            }
        }

        if draining && in_flight == 0 {
            return Ok(());
        }
    }
}
