use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthOperation {
    SignOut,
    /// Update the display name held by the identity provider. The `users`
    /// document is updated separately through the document store.
    UpdateDisplayName { name: String },
}

impl Operation for AuthOperation {
    type Output = AuthResult;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthOutput {
    SignedOut,
    DisplayNameUpdated,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthError {
    #[error("no signed-in user")]
    NotSignedIn,

    #[error("auth error: {message}")]
    Backend { message: String },
}

pub type AuthResult = Result<AuthOutput, AuthError>;

#[derive(Clone)]
pub struct Auth<E> {
    context: CapabilityContext<AuthOperation, E>,
}

impl<Ev> Capability<Ev> for Auth<Ev> {
    type Operation = AuthOperation;
    type MappedSelf<MappedEv> = Auth<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Auth::new(self.context.map_event(f))
    }
}

impl<E> Auth<E>
where
    E: 'static,
{
    pub fn new(context: CapabilityContext<AuthOperation, E>) -> Self {
        Self { context }
    }

    pub fn sign_out<F>(&self, make_event: F)
    where
        F: Fn(AuthResult) -> E + Send + Sync + 'static,
    {
        self.request(AuthOperation::SignOut, make_event);
    }

    pub fn update_display_name<F>(&self, name: impl Into<String>, make_event: F)
    where
        F: Fn(AuthResult) -> E + Send + Sync + 'static,
    {
        self.request(
            AuthOperation::UpdateDisplayName { name: name.into() },
            make_event,
        );
    }

    fn request<F>(&self, operation: AuthOperation, make_event: F)
    where
        F: Fn(AuthResult) -> E + Send + Sync + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context.request_from_shell(operation).await;
            context.update_app(make_event(result));
        });
    }
}
