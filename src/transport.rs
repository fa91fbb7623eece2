//! In-process notification channel between the display and the gateway helper task.

use crate::api::{Error, GatewayClient};
use crate::model::{FetchRequest, FetchResult};
use tokio::sync::{mpsc, oneshot};

const QUEUE_DEPTH: usize = 1;

#[derive(Debug)]
struct Notification {
    request: FetchRequest,
    reply: oneshot::Sender<FetchResult>,
}

/// Display-side end of the channel.
#[derive(Debug, Clone)]
pub struct HelperHandle {
    sender: mpsc::Sender<Notification>,
}

impl HelperHandle {
    /// Send a fetch request and wait for the helper's reply.
    pub async fn request(&self, request: FetchRequest) -> Result<FetchResult, Error> {
        let (reply, response) = oneshot::channel();

        self.sender
            .send(Notification { request, reply })
            .await
            .map_err(|e| Error::TransportError(e.to_string()))?;

        response
            .await
            .map_err(|e| Error::TransportError(e.to_string()))
    }
}

/// Start the gateway helper on the current tokio runtime.
///
/// Requests are served one at a time; the task ends once every handle is dropped.
pub fn spawn_helper(client: GatewayClient) -> HelperHandle {
    let (sender, mut receiver) = mpsc::channel::<Notification>(QUEUE_DEPTH);

    tokio::spawn(async move {
        log::info!("starting gateway helper");

        while let Some(notification) = receiver.recv().await {
            let result = client.fetch_metrics(&notification.request).await;
            if notification.reply.send(result).is_err() {
                log::warn!("display went away before the fetch completed");
            }
        }

        log::info!("gateway helper stopped");
    });

    HelperHandle { sender }
}
