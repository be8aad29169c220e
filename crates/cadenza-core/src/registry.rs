//! Identity registry
//!
//! Guarantees at most one live instance per item id. Items are created
//! lazily on first lookup and hydrated from the backing store.

use std::collections::HashMap;
use std::sync::{ Arc, Mutex, MutexGuard, PoisonError };

use thiserror::Error;

use crate::artist::FOR_ITEM_PREFIX;
use crate::codec::CodecError;
use crate::item::MediaItem;
use crate::store::{ ItemStore, PersistQueue, StoreError };


/// Errors that can occur with registry operations.
#[derive( Debug, Error )]
pub enum RegistryError {
    #[error( "Item id must not be blank" )]
    BlankId,

    #[error( "Failed to encode {id}: {source}" )]
    Codec {
        id: String,
        #[source]
        source: CodecError,
    },

    #[error( "Storage error: {0}" )]
    Store( #[from] StoreError ),
}


/// Process-scoped map from id to the shared item instance.
pub struct Registry<T: MediaItem> {
    items: Mutex<HashMap<String, Arc<T>>>,
    store: Arc<dyn ItemStore>,
    queue: Arc<PersistQueue>,
}


impl<T: MediaItem> Registry<T> {
    /// Creates an empty registry backed by `store`.
    pub fn new( store: Arc<dyn ItemStore> ) -> Self {
        Self {
            items: Mutex::new( HashMap::new() ),
            store,
            queue: Arc::new( PersistQueue::new() ),
        }
    }


    fn lock( &self ) -> MutexGuard<'_, HashMap<String, Arc<T>>> {
        self.items.lock().unwrap_or_else( PoisonError::into_inner )
    }


    /// Gets the item for `id`, creating and hydrating it on first use.
    pub fn get_or_create( &self, id: &str ) -> Result<Arc<T>, RegistryError> {
        if id.trim().is_empty() {
            return Err( RegistryError::BlankId );
        }
        Ok( self.get_or_insert( id.to_string(), false ) )
    }


    /// Gets the placeholder item linked to `donor_id`.
    ///
    /// The placeholder's id is the donor's id with [`FOR_ITEM_PREFIX`] prepended.
    pub fn create_for_item( &self, donor_id: &str ) -> Result<Arc<T>, RegistryError> {
        if donor_id.trim().is_empty() {
            return Err( RegistryError::BlankId );
        }
        Ok( self.get_or_insert( format!( "{}{}", FOR_ITEM_PREFIX, donor_id ), true ) )
    }


    /// Creates an unregistered item with a blank id.
    ///
    /// Temporary items are never hydrated or persisted.
    pub fn create_temporary( &self ) -> Arc<T> {
        Arc::new( T::create( String::new(), false, None ) )
    }


    /// Gets the item for `id` without creating it.
    pub fn get( &self, id: &str ) -> Option<Arc<T>> {
        self.lock().get( id ).cloned()
    }


    /// Drops every registered item and pending write.
    ///
    /// @returns The number of items that were registered
    pub fn clear_all( &self ) -> usize {
        let mut items = self.lock();
        let amount = items.len();
        items.clear();
        self.queue.clear();
        tracing::info!( "Cleared {} {} items", amount, T::KIND );
        amount
    }


    pub fn len( &self ) -> usize {
        self.lock().len()
    }


    pub fn is_empty( &self ) -> bool {
        self.lock().is_empty()
    }


    /// Gets the number of items waiting to be written.
    pub fn pending( &self ) -> usize {
        self.queue.len()
    }


    /// Writes every changed item to the store.
    ///
    /// On failure the failing item and any not yet written stay scheduled.
    ///
    /// @returns The number of items written
    pub fn flush( &self ) -> Result<usize, RegistryError> {
        let ids = self.queue.drain();
        let mut written = 0;

        for ( index, id ) in ids.iter().enumerate() {
            let Some( item ) = self.get( id ) else {
                continue;
            };
            if !item.core().take_dirty() {
                continue;
            }

            if let Err( e ) = self.write( &*item ) {
                item.core().mark_dirty();
                for rest in &ids[ index + 1.. ] {
                    self.queue.push( rest );
                }
                return Err( e );
            }
            written += 1;
        }

        if written > 0 {
            tracing::debug!( "Flushed {} {} items", written, T::KIND );
        }
        Ok( written )
    }


    fn write( &self, item: &T ) -> Result<(), RegistryError> {
        let data = item.serialise().map_err( |source| RegistryError::Codec {
            id: item.id().to_string(),
            source,
        } )?;
        self.store.save( &item.key(), &data )?;
        Ok(())
    }


    /// Check-create-insert under one lock so concurrent callers share an instance.
    fn get_or_insert( &self, id: String, is_for_item: bool ) -> Arc<T> {
        let mut items = self.lock();
        if let Some( item ) = items.get( &id ) {
            return Arc::clone( item );
        }

        let item = Arc::new( T::create( id.clone(), is_for_item, Some( Arc::clone( &self.queue ) ) ) );
        self.hydrate( &item );
        items.insert( id, Arc::clone( &item ) );
        item
    }


    /// Loads stored data into a new item. Bad records leave the item empty.
    fn hydrate( &self, item: &T ) {
        let key = item.key();
        match self.store.load( &key ) {
            Ok( Some( data ) ) => {
                if let Err( e ) = item.supply_from_serialised( data ) {
                    tracing::warn!( "Ignoring cached data for {}: {}", key, e );
                } else {
                    tracing::debug!( "Hydrated {}", key );
                }
            }
            Ok( None ) => {}
            Err( e ) => {
                tracing::warn!( "Failed to load {}: {}", key, e );
            }
        }
    }
}


impl<T: MediaItem> std::fmt::Debug for Registry<T> {
    fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
        f.debug_struct( "Registry" )
            .field( "kind", &T::KIND )
            .field( "len", &self.len() )
            .field( "pending", &self.pending() )
            .finish()
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::artist::Artist;
    use crate::field::SupplyMode;
    use crate::store::MemoryStore;


    fn registry() -> Registry<Artist> {
        Registry::new( Arc::new( MemoryStore::new() ) )
    }


    #[test]
    fn test_same_id_same_instance() {
        let registry = registry();
        let a = registry.get_or_create( "A1" ).unwrap();
        let b = registry.get_or_create( "A1" ).unwrap();
        assert!( Arc::ptr_eq( &a, &b ) );
        assert_eq!( registry.len(), 1 );
    }


    #[test]
    fn test_blank_id_rejected() {
        let registry = registry();
        assert!( matches!( registry.get_or_create( "" ), Err( RegistryError::BlankId ) ) );
        assert!( matches!( registry.get_or_create( "  " ), Err( RegistryError::BlankId ) ) );
        assert!( matches!( registry.create_for_item( "" ), Err( RegistryError::BlankId ) ) );
        assert!( registry.is_empty() );
    }


    #[test]
    fn test_create_for_item() {
        let registry = registry();
        let placeholder = registry.create_for_item( "song1" ).unwrap();

        assert_eq!( placeholder.id(), "FSsong1" );
        assert!( placeholder.is_for_item() );
        assert!( Arc::ptr_eq( &placeholder, &registry.get_or_create( "FSsong1" ).unwrap() ) );
    }


    #[test]
    fn test_temporary_is_unregistered() {
        let registry = registry();
        let temp = registry.create_temporary();

        assert!( temp.is_temp() );
        temp.supply_title( Some( "Preview".into() ), SupplyMode::SPECULATIVE );
        assert!( registry.is_empty() );
        assert_eq!( registry.pending(), 0 );
    }


    #[test]
    fn test_flush_skips_evicted_items() {
        let registry = registry();
        let artist = registry.get_or_create( "A1" ).unwrap();
        artist.supply_title( Some( "Band".into() ), SupplyMode::SPECULATIVE );

        assert_eq!( registry.clear_all(), 1 );
        assert_eq!( registry.pending(), 0 );
        assert_eq!( registry.flush().unwrap(), 0 );
    }
}
