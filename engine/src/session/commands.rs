use tokio::sync::oneshot;

use super::{SearchRequest, SubmissionId, SubmissionReply};

pub(crate) enum SessionCommand {
    Submit {
        id: SubmissionId,
        request: SearchRequest,
        reply: SubmissionReply,
    },
    Stop,
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}
