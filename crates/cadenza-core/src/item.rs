//! Shared media item state and change notification

use std::sync::atomic::{ AtomicBool, AtomicU64, Ordering };
use std::sync::{ Arc, Mutex, PoisonError, RwLock };

use serde_json::Value;

use crate::codec::{ self, CodecError };
use crate::field::{ Field, FieldState, SupplyMode };
use crate::store::{ ItemKey, PersistQueue };


/// Number of serialised values written by [`ItemCore::serialise_base`].
pub const BASE_FIELD_COUNT: usize = 2;


/// Emitted whenever an item field actually changes.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct ChangeEvent {
    pub kind: &'static str,
    pub id: String,
    /// True if the new value was read back from storage.
    pub cached: bool,
}


/// Callback invoked with every [`ChangeEvent`] of an item.
pub type ChangeListener = Arc<dyn Fn( &ChangeEvent ) + Send + Sync>;


/// Handle returned by [`ItemCore::add_listener`].
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub struct ListenerId( u64 );


/// A media item that can live in a [`Registry`](crate::Registry).
pub trait MediaItem: Send + Sync + Sized + 'static {
    /// Storage namespace for this item type.
    const KIND: &'static str;

    /// Constructs an empty item.
    ///
    /// Items created without a queue are never scheduled for persistence.
    fn create( id: String, is_for_item: bool, queue: Option<Arc<PersistQueue>> ) -> Self;

    fn core( &self ) -> &ItemCore;

    /// Encodes the item in writer order.
    fn serialise( &self ) -> Result<Vec<Value>, CodecError>;

    /// Hydrates the item from values produced by [`MediaItem::serialise`].
    fn supply_from_serialised( &self, data: Vec<Value> ) -> Result<(), CodecError>;

    fn id( &self ) -> &str {
        self.core().id()
    }

    /// Temporary items have a blank id and are never registered.
    fn is_temp( &self ) -> bool {
        self.core().is_temp()
    }

    fn key( &self ) -> ItemKey {
        ItemKey::new( Self::KIND, self.id() )
    }
}


#[derive( Debug, Default )]
struct BaseData {
    title: Field<String>,
    thumbnail_url: Field<String>,
}


/// Base fields decoded ahead of being applied.
#[derive( Debug, Default )]
pub struct BaseSnapshot {
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
}


/// State common to every media item: identity, base fields, listeners and
/// persistence bookkeeping.
pub struct ItemCore {
    kind: &'static str,
    id: String,
    base: RwLock<BaseData>,
    listeners: Mutex<Vec<( ListenerId, ChangeListener )>>,
    next_listener: AtomicU64,
    dirty: AtomicBool,
    queue: Option<Arc<PersistQueue>>,
}


impl ItemCore {
    pub fn new( kind: &'static str, id: String, queue: Option<Arc<PersistQueue>> ) -> Self {
        Self {
            kind,
            id,
            base: RwLock::new( BaseData::default() ),
            listeners: Mutex::new( Vec::new() ),
            next_listener: AtomicU64::new( 0 ),
            dirty: AtomicBool::new( false ),
            queue,
        }
    }


    pub fn id( &self ) -> &str {
        &self.id
    }


    pub fn kind( &self ) -> &'static str {
        self.kind
    }


    pub fn is_temp( &self ) -> bool {
        self.id.trim().is_empty()
    }


    /// Returns true if the item has changes not yet written to storage.
    pub fn is_dirty( &self ) -> bool {
        self.dirty.load( Ordering::SeqCst )
    }


    /// Clears the dirty flag, returning its previous value.
    pub fn take_dirty( &self ) -> bool {
        self.dirty.swap( false, Ordering::SeqCst )
    }


    /// Registers a change listener.
    pub fn add_listener( &self, listener: ChangeListener ) -> ListenerId {
        let id = ListenerId( self.next_listener.fetch_add( 1, Ordering::Relaxed ) );
        self.listeners.lock().unwrap_or_else( PoisonError::into_inner ).push(( id, listener ));
        id
    }


    /// Removes a change listener.
    ///
    /// @returns true if the listener was registered
    pub fn remove_listener( &self, id: ListenerId ) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else( PoisonError::into_inner );
        let before = listeners.len();
        listeners.retain( |( lid, _ )| *lid != id );
        listeners.len() != before
    }


    /// Marks the item dirty and schedules it for persistence.
    pub fn mark_dirty( &self ) {
        self.dirty.store( true, Ordering::SeqCst );
        if let Some( queue ) = &self.queue {
            queue.push( &self.id );
        }
    }


    /// Records that a field changed.
    ///
    /// Fresh values mark the item dirty and schedule it for persistence;
    /// values read back from storage never do.
    pub fn on_changed( &self, cached: bool ) {
        if !cached {
            self.mark_dirty();
        }

        let event = ChangeEvent { kind: self.kind, id: self.id.clone(), cached };

        // Listeners may read the item, so call them outside the lock
        let listeners: Vec<ChangeListener> = self.listeners
            .lock()
            .unwrap_or_else( PoisonError::into_inner )
            .iter()
            .map( |( _, l )| Arc::clone( l ) )
            .collect();

        for listener in listeners {
            listener( &event );
        }
    }


    /// Applies `write` to the base fields and notifies if it reports a change.
    fn supply_base( &self, mode: SupplyMode, write: impl FnOnce( &mut BaseData ) -> bool ) {
        let changed = write( &mut self.base.write().unwrap_or_else( PoisonError::into_inner ) );
        if changed {
            self.on_changed( mode.cached );
        }
    }


    pub fn title( &self ) -> Option<String> {
        self.base.read().unwrap_or_else( PoisonError::into_inner ).title.get().cloned()
    }


    pub fn title_state( &self ) -> FieldState {
        self.base.read().unwrap_or_else( PoisonError::into_inner ).title.state()
    }


    pub fn supply_title( &self, value: Option<String>, mode: SupplyMode ) {
        self.supply_base( mode, |base| base.title.supply( value, mode.certain ) );
    }


    pub fn thumbnail_url( &self ) -> Option<String> {
        self.base.read().unwrap_or_else( PoisonError::into_inner ).thumbnail_url.get().cloned()
    }


    pub fn supply_thumbnail_url( &self, value: Option<String>, mode: SupplyMode ) {
        self.supply_base( mode, |base| base.thumbnail_url.supply( value, mode.certain ) );
    }


    /// Encodes the base fields.
    pub fn serialise_base( &self ) -> Result<Vec<Value>, CodecError> {
        let base = self.base.read().unwrap_or_else( PoisonError::into_inner );
        Ok( vec![
            codec::encode( base.title.get() )?,
            codec::encode( base.thumbnail_url.get() )?,
        ] )
    }


    /// Decodes the base fields from what remains after an item popped its own.
    pub fn decode_base( mut data: Vec<Value> ) -> Result<BaseSnapshot, CodecError> {
        codec::require_len( &data, BASE_FIELD_COUNT )?;
        let thumbnail_url = codec::pop( &mut data )?;
        let title = codec::pop( &mut data )?;
        Ok( BaseSnapshot { title, thumbnail_url } )
    }


    /// Applies decoded base fields as cached, certain values.
    pub fn apply_base( &self, snapshot: BaseSnapshot ) {
        if snapshot.thumbnail_url.is_some() {
            self.supply_thumbnail_url( snapshot.thumbnail_url, SupplyMode::HYDRATE );
        }
        if snapshot.title.is_some() {
            self.supply_title( snapshot.title, SupplyMode::HYDRATE );
        }
    }
}


impl std::fmt::Debug for ItemCore {
    fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
        f.debug_struct( "ItemCore" )
            .field( "kind", &self.kind )
            .field( "id", &self.id )
            .field( "base", &self.base )
            .field( "dirty", &self.is_dirty() )
            .finish_non_exhaustive()
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use serde_json::json;


    fn recording( core: &ItemCore ) -> Arc<Mutex<Vec<ChangeEvent>>> {
        let events = Arc::new( Mutex::new( Vec::new() ) );
        let sink = Arc::clone( &events );
        core.add_listener( Arc::new( move |e: &ChangeEvent| sink.lock().unwrap().push( e.clone() ) ) );
        events
    }


    #[test]
    fn test_fresh_change_schedules_persistence() {
        let queue = Arc::new( PersistQueue::new() );
        let core = ItemCore::new( "artist", "A1".into(), Some( Arc::clone( &queue ) ) );
        let events = recording( &core );

        core.supply_title( Some( "Name".into() ), SupplyMode::SPECULATIVE );

        assert!( core.is_dirty() );
        assert_eq!( queue.drain(), vec![ "A1".to_string() ] );
        assert_eq!( events.lock().unwrap().as_slice(), &[ ChangeEvent {
            kind: "artist",
            id: "A1".into(),
            cached: false,
        } ] );
    }


    #[test]
    fn test_cached_change_does_not_schedule() {
        let queue = Arc::new( PersistQueue::new() );
        let core = ItemCore::new( "artist", "A1".into(), Some( Arc::clone( &queue ) ) );
        let events = recording( &core );

        core.supply_title( Some( "Name".into() ), SupplyMode::HYDRATE );

        assert!( !core.is_dirty() );
        assert!( queue.is_empty() );
        assert_eq!( events.lock().unwrap().len(), 1 );
        assert!( events.lock().unwrap()[ 0 ].cached );
    }


    #[test]
    fn test_no_change_no_event() {
        let core = ItemCore::new( "artist", "A1".into(), None );
        let events = recording( &core );

        core.supply_title( Some( "Name".into() ), SupplyMode::SPECULATIVE );
        core.supply_title( Some( "Other".into() ), SupplyMode::SPECULATIVE );

        assert_eq!( core.title(), Some( "Name".to_string() ) );
        assert_eq!( events.lock().unwrap().len(), 1 );
    }


    #[test]
    fn test_removed_listener_is_not_called() {
        let core = ItemCore::new( "artist", "A1".into(), None );
        let events = Arc::new( Mutex::new( 0 ) );
        let sink = Arc::clone( &events );
        let id = core.add_listener( Arc::new( move |_: &ChangeEvent| *sink.lock().unwrap() += 1 ) );

        assert!( core.remove_listener( id ) );
        assert!( !core.remove_listener( id ) );

        core.supply_title( Some( "Name".into() ), SupplyMode::SPECULATIVE );
        assert_eq!( *events.lock().unwrap(), 0 );
    }


    #[test]
    fn test_decode_base_requires_both_fields() {
        let err = ItemCore::decode_base( vec![ json!( "t" ) ] ).unwrap_err();
        assert!( matches!( err, CodecError::Truncated { expected: 2, found: 1 } ) );

        let snapshot = ItemCore::decode_base( vec![ json!( "t" ), Value::Null ] ).unwrap();
        assert_eq!( snapshot.title.as_deref(), Some( "t" ) );
        assert_eq!( snapshot.thumbnail_url, None );
    }
}
