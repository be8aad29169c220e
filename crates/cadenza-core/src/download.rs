//! Download progress polling
//!
//! The download manager itself lives outside this crate; this module only
//! watches one song's download and republishes its status and progress.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;


/// How often an active download is polled.
pub const POLL_INTERVAL: Duration = Duration::from_millis( 1500 );


/// State of a song download.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum DownloadState {
    Idle,
    Downloading,
    Paused,
    Cancelled,
    AlreadyFinished,
    Finished,
}


impl DownloadState {
    /// True while progress can still move.
    pub fn is_active( self ) -> bool {
        matches!( self, Self::Downloading | Self::Paused )
    }


    pub fn is_finished( self ) -> bool {
        matches!( self, Self::Finished | Self::AlreadyFinished )
    }
}


/// Snapshot of one download.
#[derive( Debug, Clone, PartialEq )]
pub struct DownloadStatus {
    pub song_id: String,
    pub state: DownloadState,
    /// Fraction complete, 0.0 to 1.0.
    pub progress: f32,
}


/// Local download manager.
pub trait DownloadManager: Send + Sync {
    /// Gets the current status of a song's download, if one exists.
    fn get_download( &self, song_id: &str ) -> Option<DownloadStatus>;

    fn start_download( &self, song_id: &str );
}


/// Starts a download unless the song is already downloaded.
///
/// @returns true if a download was started
pub fn request_download( manager: &dyn DownloadManager, song_id: &str ) -> bool {
    let finished = manager.get_download( song_id )
        .map( |s| s.state.is_finished() )
        .unwrap_or( false );

    if finished {
        return false;
    }

    tracing::info!( "Starting download of {}", song_id );
    manager.start_download( song_id );
    true
}


/// Polls one song's download on a background task.
///
/// Progress is only refreshed while the download is active. The task stops
/// when the poller is dropped.
pub struct ProgressPoller {
    status: watch::Receiver<Option<DownloadStatus>>,
    progress: watch::Receiver<f32>,
    task: JoinHandle<()>,
}


impl ProgressPoller {
    /// Spawns the polling task. Must be called from within a tokio runtime.
    pub fn spawn( manager: Arc<dyn DownloadManager>, song_id: impl Into<String> ) -> Self {
        let song_id = song_id.into();
        let ( status_tx, status ) = watch::channel( None );
        let ( progress_tx, progress ) = watch::channel( 0.0_f32 );

        let task = tokio::spawn( async move {
            let mut interval = tokio::time::interval( POLL_INTERVAL );

            loop {
                interval.tick().await;

                let current = manager.get_download( &song_id );
                if let Some( s ) = current.as_ref().filter( |s| s.state.is_active() ) {
                    progress_tx.send_replace( s.progress );
                }
                status_tx.send_if_modified( |held| {
                    if *held == current {
                        return false;
                    }
                    tracing::debug!( "Download of {} is now {:?}", song_id, current.as_ref().map( |s| s.state ) );
                    *held = current;
                    true
                } );

                if status_tx.is_closed() && progress_tx.is_closed() {
                    break;
                }
            }
        } );

        Self { status, progress, task }
    }


    /// Gets the last polled status.
    pub fn status( &self ) -> Option<DownloadStatus> {
        self.status.borrow().clone()
    }


    /// Gets the last polled progress of an active download.
    pub fn progress( &self ) -> f32 {
        *self.progress.borrow()
    }


    /// Subscribes to status changes.
    pub fn watch_status( &self ) -> watch::Receiver<Option<DownloadStatus>> {
        self.status.clone()
    }


    /// Subscribes to progress changes.
    pub fn watch_progress( &self ) -> watch::Receiver<f32> {
        self.progress.clone()
    }
}


impl Drop for ProgressPoller {
    fn drop( &mut self ) {
        self.task.abort();
    }
}


#[cfg( test )]
mod tests {
    use std::sync::Mutex;

    use super::*;


    #[derive( Default )]
    struct FakeManager {
        status: Mutex<Option<DownloadStatus>>,
        started: Mutex<Vec<String>>,
    }


    impl FakeManager {
        fn set( &self, state: DownloadState, progress: f32 ) {
            *self.status.lock().unwrap() = Some( DownloadStatus {
                song_id: "s1".into(),
                state,
                progress,
            } );
        }
    }


    impl DownloadManager for FakeManager {
        fn get_download( &self, _song_id: &str ) -> Option<DownloadStatus> {
            self.status.lock().unwrap().clone()
        }


        fn start_download( &self, song_id: &str ) {
            self.started.lock().unwrap().push( song_id.to_string() );
        }
    }


    #[test]
    fn test_request_download() {
        let manager = FakeManager::default();
        assert!( request_download( &manager, "s1" ) );

        manager.set( DownloadState::Finished, 1.0 );
        assert!( !request_download( &manager, "s1" ) );

        assert_eq!( *manager.started.lock().unwrap(), vec![ "s1".to_string() ] );
    }


    #[tokio::test( start_paused = true )]
    async fn test_poller_tracks_active_download() {
        let manager = Arc::new( FakeManager::default() );
        manager.set( DownloadState::Downloading, 0.1 );

        let poller = ProgressPoller::spawn( manager.clone(), "s1" );
        tokio::time::sleep( Duration::from_millis( 10 ) ).await;
        assert_eq!( poller.progress(), 0.1 );
        assert_eq!( poller.status().map( |s| s.state ), Some( DownloadState::Downloading ) );

        manager.set( DownloadState::Paused, 0.5 );
        tokio::time::sleep( POLL_INTERVAL ).await;
        assert_eq!( poller.progress(), 0.5 );
        assert_eq!( poller.status().map( |s| s.state ), Some( DownloadState::Paused ) );

        // Finished downloads keep the last active progress
        manager.set( DownloadState::Finished, 1.0 );
        tokio::time::sleep( POLL_INTERVAL ).await;
        assert_eq!( poller.progress(), 0.5 );
        assert_eq!( poller.status().map( |s| s.state ), Some( DownloadState::Finished ) );
    }


    #[tokio::test( start_paused = true )]
    async fn test_poller_without_download() {
        let manager = Arc::new( FakeManager::default() );
        let poller = ProgressPoller::spawn( manager, "s1" );
        tokio::time::sleep( Duration::from_millis( 10 ) ).await;

        assert_eq!( poller.status(), None );
        assert_eq!( poller.progress(), 0.0 );
    }
}
