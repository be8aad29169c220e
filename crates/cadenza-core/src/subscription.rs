//! Artist subscription status against the remote music API

use std::sync::Arc;
use std::thread;

use thiserror::Error;

use crate::artist::Artist;
use crate::item::MediaItem;


/// Errors reported by a [`SubscriptionApi`] implementation.
#[derive( Debug, Error )]
pub enum ApiError {
    #[error( "Request failed: {0}" )]
    Request( String ),

    #[error( "Unexpected response: {0}" )]
    Response( String ),
}


/// Errors that can occur while reading or toggling a subscription.
#[derive( Debug, Error )]
pub enum SubscriptionError {
    #[error( "Placeholder artist {0} cannot be subscribed to" )]
    ForItem( String ),

    #[error( "Not signed in" )]
    NotAuthenticated,

    #[error( "Subscription state of {0} is not known yet" )]
    UnknownState( String ),

    #[error( "API error: {0}" )]
    Api( #[from] ApiError ),
}


/// Remote operations on the signed-in user's subscriptions.
pub trait SubscriptionApi: Send + Sync {
    fn is_authenticated( &self ) -> bool;

    fn is_subscribed( &self, artist: &Artist ) -> Result<bool, ApiError>;

    fn set_subscribed( &self, artist: &Artist, subscribed: bool ) -> Result<(), ApiError>;
}


impl Artist {
    /// Refreshes [`Artist::subscribed`] from the API.
    ///
    /// A failed request leaves the state unknown. Own channels are skipped.
    pub fn update_subscribed( &self, api: &dyn SubscriptionApi ) -> Result<(), SubscriptionError> {
        if self.is_for_item() {
            return Err( SubscriptionError::ForItem( self.id().to_string() ) );
        }
        if self.is_own_channel() {
            return Ok(());
        }

        let status = match api.is_subscribed( self ) {
            Ok( s ) => Some( s ),
            Err( e ) => {
                tracing::debug!( "Failed to get subscription state of {}: {}", self.id(), e );
                None
            }
        };
        self.set_subscribed( status );
        Ok(())
    }


    /// Flips the subscription on a background thread.
    ///
    /// With `toggle_before_fetch` the local state flips before the request
    /// and is restored if the request fails. `on_finished( success, subscribing )`
    /// is called once after a completed request; it is not called on error.
    ///
    /// @returns The handle of the background thread, which yields whether the
    ///          remote state now matches the requested one
    pub fn toggle_subscribe<F>(
        self: &Arc<Self>,
        api: Arc<dyn SubscriptionApi>,
        toggle_before_fetch: bool,
        on_finished: Option<F>,
    ) -> Result<thread::JoinHandle<Result<bool, SubscriptionError>>, SubscriptionError>
    where
        F: FnOnce( bool, bool ) + Send + 'static,
    {
        if self.is_for_item() {
            return Err( SubscriptionError::ForItem( self.id().to_string() ) );
        }
        if !api.is_authenticated() {
            return Err( SubscriptionError::NotAuthenticated );
        }

        let artist = Arc::clone( self );
        Ok( thread::spawn( move || {
            let current = artist.subscribed()
                .ok_or_else( || SubscriptionError::UnknownState( artist.id().to_string() ) )?;
            let target = !current;

            if toggle_before_fetch {
                artist.set_subscribed( Some( target ) );
            }

            if let Err( e ) = api.set_subscribed( &artist, target ) {
                tracing::warn!( "Failed to set subscription of {}: {}", artist.id(), e );
                if toggle_before_fetch {
                    artist.set_subscribed( Some( current ) );
                }
                return Err( e.into() );
            }

            artist.update_subscribed( api.as_ref() )?;

            let success = artist.subscribed() == Some( target );
            if let Some( callback ) = on_finished {
                callback( success, target );
            }
            Ok( success )
        } ) )
    }
}


#[cfg( test )]
mod tests {
    use std::sync::atomic::{ AtomicBool, Ordering };
    use std::sync::Mutex;

    use super::*;


    #[derive( Default )]
    struct FakeApi {
        signed_in: bool,
        subscribed: AtomicBool,
        fail_writes: bool,
    }


    impl SubscriptionApi for FakeApi {
        fn is_authenticated( &self ) -> bool {
            self.signed_in
        }


        fn is_subscribed( &self, _artist: &Artist ) -> Result<bool, ApiError> {
            Ok( self.subscribed.load( Ordering::SeqCst ) )
        }


        fn set_subscribed( &self, _artist: &Artist, subscribed: bool ) -> Result<(), ApiError> {
            if self.fail_writes {
                return Err( ApiError::Request( "offline".into() ) );
            }
            self.subscribed.store( subscribed, Ordering::SeqCst );
            Ok(())
        }
    }


    fn artist( id: &str, is_for_item: bool ) -> Arc<Artist> {
        Arc::new( Artist::create( id.to_string(), is_for_item, None ) )
    }


    type Callback = fn( bool, bool );


    #[test]
    fn test_update_subscribed() {
        let api = FakeApi { signed_in: true, subscribed: AtomicBool::new( true ), ..Default::default() };
        let a = artist( "A1", false );

        a.update_subscribed( &api ).unwrap();
        assert_eq!( a.subscribed(), Some( true ) );
    }


    #[test]
    fn test_update_subscribed_skips_own_channel() {
        let api = FakeApi { signed_in: true, subscribed: AtomicBool::new( true ), ..Default::default() };
        let a = artist( "A1", false );
        a.set_own_channel( true );

        a.update_subscribed( &api ).unwrap();
        assert_eq!( a.subscribed(), None );
    }


    #[test]
    fn test_toggle_subscribe() {
        let api: Arc<dyn SubscriptionApi> = Arc::new( FakeApi { signed_in: true, ..Default::default() } );
        let a = artist( "A1", false );
        a.update_subscribed( api.as_ref() ).unwrap();
        assert_eq!( a.subscribed(), Some( false ) );

        let result = Arc::new( Mutex::new( None ) );
        let sink = Arc::clone( &result );
        let handle = a.toggle_subscribe(
            Arc::clone( &api ),
            false,
            Some( move |success: bool, subscribing: bool| *sink.lock().unwrap() = Some(( success, subscribing )) ),
        ).unwrap();

        assert!( handle.join().unwrap().unwrap() );
        assert_eq!( a.subscribed(), Some( true ) );
        assert_eq!( *result.lock().unwrap(), Some(( true, true )) );
    }


    #[test]
    fn test_toggle_failure_restores_state() {
        let api: Arc<dyn SubscriptionApi> = Arc::new( FakeApi {
            signed_in: true,
            fail_writes: true,
            ..Default::default()
        } );
        let a = artist( "A1", false );
        a.set_subscribed( Some( false ) );

        let called = Arc::new( AtomicBool::new( false ) );
        let flag = Arc::clone( &called );
        let handle = a.toggle_subscribe(
            api,
            true,
            Some( move |_: bool, _: bool| flag.store( true, Ordering::SeqCst ) ),
        ).unwrap();

        assert!( matches!( handle.join().unwrap(), Err( SubscriptionError::Api( _ ) ) ) );
        assert_eq!( a.subscribed(), Some( false ) );
        assert!( !called.load( Ordering::SeqCst ) );
    }


    #[test]
    fn test_toggle_requires_known_state() {
        let api: Arc<dyn SubscriptionApi> = Arc::new( FakeApi { signed_in: true, ..Default::default() } );
        let handle = artist( "A1", false ).toggle_subscribe::<Callback>( api, false, None ).unwrap();
        assert!( matches!( handle.join().unwrap(), Err( SubscriptionError::UnknownState( _ ) ) ) );
    }


    #[test]
    fn test_toggle_preconditions() {
        let signed_out: Arc<dyn SubscriptionApi> = Arc::new( FakeApi::default() );
        let result = artist( "A1", false ).toggle_subscribe::<Callback>( signed_out, false, None );
        assert!( matches!( result, Err( SubscriptionError::NotAuthenticated ) ) );

        let api: Arc<dyn SubscriptionApi> = Arc::new( FakeApi { signed_in: true, ..Default::default() } );
        let result = artist( "FSs1", true ).toggle_subscribe::<Callback>( api, false, None );
        assert!( matches!( result, Err( SubscriptionError::ForItem( _ ) ) ) );
    }
}
