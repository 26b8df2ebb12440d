use crate::application::Application;
use crate::bootstrap::Bootstrapper;
use crate::dispatcher::EventDispatcher;
use crate::installer::DependencyInstaller;
use crate::Result;
use log::{error, info};

/// Bootstrap the runtime, then dispatch raw events until the stream ends.
///
/// Events that arrive while the bootstrap runs wait in `events` and are
/// handled afterwards, in order.
pub fn run_worker<I, A, E>(bootstrapper: Bootstrapper<I, A>, events: E) -> Result<()>
where
    I: DependencyInstaller,
    A: Application,
    E: IntoIterator<Item = String>,
{
    let session = bootstrapper.initialize()?;
    let mut dispatcher = EventDispatcher::new(session);
    info!("session ready");

    for raw in events {
        if let Err(err) = dispatcher.dispatch_raw(&raw) {
            error!("event failed: {}", err);
            dispatcher.report(&err);
        }
    }

    info!("event stream closed");
    Ok(())
}
