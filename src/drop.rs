use std::thread;
use std::thread::JoinHandle;

/// Owned handle of a runtime thread.
///
/// Joins on drop. The owner is expected to have signalled the thread to stop
/// beforehand; joining from the thread itself is skipped.
#[derive(Debug)]
pub struct DropHandle(Option<JoinHandle<()>>);

impl DropHandle {
	pub fn spawn<F>(name: String, body: F) -> std::io::Result<Self>
	where
		F: FnOnce() + Send + 'static,
	{
		let handle = thread::Builder::new().name(name).spawn(body)?;
		Ok(Self(Some(handle)))
	}

	pub fn join(&mut self) {
		let Some(handle) = self.0.take() else {
			return;
		};

		if handle.thread().id() == thread::current().id() {
			tracing::debug!(
				thread = handle.thread().name().unwrap_or("<unnamed>"),
				"Skipping self-join"
			);
			return;
		}

		let name = handle.thread().name().unwrap_or("<unnamed>").to_owned();
		if handle.join().is_err() {
			tracing::error!(thread = %name, "Runtime thread panicked");
		}
	}
}

impl Drop for DropHandle {
	fn drop(&mut self) {
		self.join()
	}
}
