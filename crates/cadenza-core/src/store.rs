//! Persisted item storage
//!
//! Items are stored as their serialised value lists, one record per
//! kind and id. Writes are batched through a [`PersistQueue`].

use std::collections::{ BTreeSet, HashMap };
use std::fmt;
use std::fs;
use std::path::{ Path, PathBuf };
use std::sync::{ Mutex, PoisonError, RwLock };

use serde_json::Value;
use thiserror::Error;


/// Errors that can occur while reading or writing stored items.
#[derive( Debug, Error )]
pub enum StoreError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Invalid stored data: {0}" )]
    Json( #[from] serde_json::Error ),

    #[error( "No cache directory available on this platform" )]
    NoCacheDir,
}


/// Identifies one stored item.
#[derive( Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord )]
pub struct ItemKey {
    pub kind: &'static str,
    pub id: String,
}


impl ItemKey {
    pub fn new( kind: &'static str, id: impl Into<String> ) -> Self {
        Self { kind, id: id.into() }
    }
}


impl fmt::Display for ItemKey {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        write!( f, "{}/{}", self.kind, self.id )
    }
}


/// Backing storage for serialised items.
pub trait ItemStore: Send + Sync {
    /// Loads the stored values for `key`, if any.
    fn load( &self, key: &ItemKey ) -> Result<Option<Vec<Value>>, StoreError>;

    /// Replaces the stored values for `key`.
    fn save( &self, key: &ItemKey, data: &[Value] ) -> Result<(), StoreError>;

    /// Removes the record for `key`.
    ///
    /// @returns true if a record existed
    fn remove( &self, key: &ItemKey ) -> Result<bool, StoreError>;
}


/// In-process store.
#[derive( Debug, Default )]
pub struct MemoryStore {
    records: RwLock<HashMap<ItemKey, Vec<Value>>>,
}


impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }


    /// Gets the number of stored records.
    pub fn len( &self ) -> usize {
        self.records.read().unwrap_or_else( PoisonError::into_inner ).len()
    }


    pub fn is_empty( &self ) -> bool {
        self.len() == 0
    }
}


impl ItemStore for MemoryStore {
    fn load( &self, key: &ItemKey ) -> Result<Option<Vec<Value>>, StoreError> {
        Ok( self.records.read().unwrap_or_else( PoisonError::into_inner ).get( key ).cloned() )
    }


    fn save( &self, key: &ItemKey, data: &[Value] ) -> Result<(), StoreError> {
        self.records
            .write()
            .unwrap_or_else( PoisonError::into_inner )
            .insert( key.clone(), data.to_vec() );
        Ok(())
    }


    fn remove( &self, key: &ItemKey ) -> Result<bool, StoreError> {
        Ok( self.records.write().unwrap_or_else( PoisonError::into_inner ).remove( key ).is_some() )
    }
}


/// Store keeping one JSON file per item.
///
/// Layout: `<root>/<kind>/<escaped id>.json`.
#[derive( Debug, Clone )]
pub struct JsonFileStore {
    root: PathBuf,
}


impl JsonFileStore {
    pub fn new( root: impl Into<PathBuf> ) -> Self {
        Self { root: root.into() }
    }


    /// Opens the store in the platform cache directory.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::default_dir().map( Self::new ).ok_or( StoreError::NoCacheDir )
    }


    /// Gets the default store directory (e.g. ~/.cache/cadenza/items on Linux).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::cache_dir().map( |d| d.join( "cadenza" ).join( "items" ) )
    }


    pub fn root( &self ) -> &Path {
        &self.root
    }


    fn record_path( &self, key: &ItemKey ) -> PathBuf {
        self.root.join( key.kind ).join( format!( "{}.json", escape_id( &key.id ) ) )
    }
}


impl ItemStore for JsonFileStore {
    fn load( &self, key: &ItemKey ) -> Result<Option<Vec<Value>>, StoreError> {
        let path = self.record_path( key );
        let contents = match fs::read_to_string( &path ) {
            Ok( c ) => c,
            Err( e ) if e.kind() == std::io::ErrorKind::NotFound => return Ok( None ),
            Err( e ) => return Err( StoreError::Io( e ) ),
        };
        Ok( Some( serde_json::from_str( &contents )? ) )
    }


    fn save( &self, key: &ItemKey, data: &[Value] ) -> Result<(), StoreError> {
        let path = self.record_path( key );

        if let Some( parent ) = path.parent() {
            fs::create_dir_all( parent )?;
        }

        fs::write( &path, serde_json::to_string( data )? )?;
        tracing::debug!( "Saved {} to {:?}", key, path );
        Ok(())
    }


    fn remove( &self, key: &ItemKey ) -> Result<bool, StoreError> {
        match fs::remove_file( self.record_path( key ) ) {
            Ok(()) => Ok( true ),
            Err( e ) if e.kind() == std::io::ErrorKind::NotFound => Ok( false ),
            Err( e ) => Err( StoreError::Io( e ) ),
        }
    }
}


/// Escapes an id into a file name; anything outside `[A-Za-z0-9_-]` becomes `%XX`.
fn escape_id( id: &str ) -> String {
    let mut out = String::with_capacity( id.len() );
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push( byte as char );
        } else {
            out.push_str( &format!( "%{:02X}", byte ) );
        }
    }
    out
}


/// Ids of items waiting to be written to storage.
#[derive( Debug, Default )]
pub struct PersistQueue {
    pending: Mutex<BTreeSet<String>>,
}


impl PersistQueue {
    pub fn new() -> Self {
        Self::default()
    }


    /// Schedules `id`; scheduling an id twice before a drain has no effect.
    pub fn push( &self, id: &str ) {
        let mut pending = self.pending.lock().unwrap_or_else( PoisonError::into_inner );
        if !pending.contains( id ) {
            pending.insert( id.to_string() );
        }
    }


    /// Takes every scheduled id.
    pub fn drain( &self ) -> Vec<String> {
        let mut pending = self.pending.lock().unwrap_or_else( PoisonError::into_inner );
        std::mem::take( &mut *pending ).into_iter().collect()
    }


    /// Drops every scheduled id.
    pub fn clear( &self ) {
        self.pending.lock().unwrap_or_else( PoisonError::into_inner ).clear();
    }


    pub fn len( &self ) -> usize {
        self.pending.lock().unwrap_or_else( PoisonError::into_inner ).len()
    }


    pub fn is_empty( &self ) -> bool {
        self.len() == 0
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use serde_json::json;


    #[test]
    fn test_escape_id() {
        assert_eq!( escape_id( "UC-abc_1" ), "UC-abc_1" );
        assert_eq!( escape_id( "a/b c" ), "a%2Fb%20c" );
    }


    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        let key = ItemKey::new( "artist", "A1" );

        assert!( store.load( &key ).unwrap().is_none() );
        store.save( &key, &[ json!( 1 ) ] ).unwrap();
        assert_eq!( store.load( &key ).unwrap(), Some( vec![ json!( 1 ) ] ) );
        assert_eq!( store.len(), 1 );

        assert!( store.remove( &key ).unwrap() );
        assert!( !store.remove( &key ).unwrap() );
        assert!( store.is_empty() );
    }


    #[test]
    fn test_json_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new( dir.path() );
        let key = ItemKey::new( "artist", "UC/odd id" );

        assert!( store.load( &key ).unwrap().is_none() );

        let data = vec![ json!( "title" ), Value::Null, json!( [ 1, 2 ] ) ];
        store.save( &key, &data ).unwrap();
        assert!( dir.path().join( "artist" ).join( "UC%2Fodd%20id.json" ).exists() );
        assert_eq!( store.load( &key ).unwrap(), Some( data ) );

        assert!( store.remove( &key ).unwrap() );
        assert!( store.load( &key ).unwrap().is_none() );
    }


    #[test]
    fn test_json_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new( dir.path() );
        let key = ItemKey::new( "artist", "A1" );

        fs::create_dir_all( dir.path().join( "artist" ) ).unwrap();
        fs::write( dir.path().join( "artist" ).join( "A1.json" ), "not json" ).unwrap();

        assert!( matches!( store.load( &key ), Err( StoreError::Json( _ ) ) ) );
    }


    #[test]
    fn test_persist_queue_dedups() {
        let queue = PersistQueue::new();
        queue.push( "b" );
        queue.push( "a" );
        queue.push( "b" );

        assert_eq!( queue.len(), 2 );
        assert_eq!( queue.drain(), vec![ "a".to_string(), "b".to_string() ] );
        assert!( queue.is_empty() );
    }
}
