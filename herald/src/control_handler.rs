//! Maps control protocol commands onto the control surface.

use std::sync::Arc;

use async_trait::async_trait;
use herald_control::{
    Command, CommandHandler, ControlError, ControlSurface, Request, Response, ResponseData,
};

pub struct HeraldControlHandler {
    surface: Arc<ControlSurface>,
}

impl HeraldControlHandler {
    #[must_use]
    pub const fn new(surface: Arc<ControlSurface>) -> Self {
        Self { surface }
    }
}

#[async_trait]
impl CommandHandler for HeraldControlHandler {
    async fn handle_request(&self, request: Request) -> herald_control::Result<Response> {
        tracing::debug!(command = ?request.command, "Handling control command");
        let surface = &self.surface;

        let data = match request.command {
            Command::Ping => return Ok(Response::ok()),
            Command::Enqueue { message, priority } => {
                if message.to.trim().is_empty() {
                    return Err(ControlError::Rejected(
                        "Recipient address is required".to_string(),
                    ));
                }
                ResponseData::Enqueued(surface.enqueue(message, priority))
            }
            Command::Health => ResponseData::Health(surface.health()),
            Command::Statistics => ResponseData::Statistics(surface.statistics()),
            Command::QueueStatus => ResponseData::QueueStatus(surface.queue_status()),
            Command::Jobs => ResponseData::Jobs(surface.jobs()),
            Command::Job(id) => ResponseData::Job(
                surface
                    .job(id)
                    .map_err(|e| ControlError::Rejected(e.to_string()))?,
            ),
            Command::ClearFailed => ResponseData::ClearFailed(surface.clear_failed_emails()),
            Command::PauseQueue => {
                surface.pause_queue();
                ResponseData::Message("Queue paused".to_string())
            }
            Command::ResumeQueue => {
                surface.resume_queue();
                ResponseData::Message("Queue resumed".to_string())
            }
            Command::Monitoring(action) => ResponseData::Monitor(surface.toggle_monitoring(action)),
            Command::TestConnection {
                provider,
                test_recipient,
            } => ResponseData::ConnectionTest(
                surface
                    .test_connection(provider, test_recipient.as_deref())
                    .await,
            ),
            Command::TestAllConfigurations => {
                ResponseData::SmtpProbe(surface.test_all_smtp_configurations().await)
            }
        };

        Ok(Response::data(data))
    }
}
