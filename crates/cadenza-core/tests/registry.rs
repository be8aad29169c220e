use std::sync::{ Arc, Barrier };
use std::thread;

use cadenza_core::{
    Artist, ArtistField, FieldState, ItemKey, ItemStore, JsonFileStore, MediaItem, MemoryStore,
    Registry, SupplyMode,
};
use serde_json::json;


fn memory_registry() -> ( Arc<MemoryStore>, Registry<Artist> ) {
    let store = Arc::new( MemoryStore::new() );
    let registry = Registry::new( store.clone() );
    ( store, registry )
}


#[test]
fn concurrent_creation_yields_one_instance() {
    let ( _, registry ) = memory_registry();
    let registry = Arc::new( registry );
    let threads = 16;
    let barrier = Arc::new( Barrier::new( threads ) );

    let handles: Vec<_> = ( 0..threads )
        .map( |_| {
            let registry = Arc::clone( &registry );
            let barrier = Arc::clone( &barrier );
            thread::spawn( move || {
                barrier.wait();
                registry.get_or_create( "A1" ).unwrap()
            } )
        } )
        .collect();

    let items: Vec<Arc<Artist>> = handles.into_iter().map( |h| h.join().unwrap() ).collect();
    assert!( items.iter().all( |item| Arc::ptr_eq( item, &items[ 0 ] ) ) );
    assert_eq!( registry.len(), 1 );
}


#[test]
fn flush_writes_changed_items() {
    let ( store, registry ) = memory_registry();
    let artist = registry.get_or_create( "A1" ).unwrap();
    artist.supply_title( Some( "Band".into() ), SupplyMode::AUTHORITATIVE )
        .supply_subscriber_count( Some( 500 ), SupplyMode::SPECULATIVE );

    assert_eq!( registry.pending(), 1 );
    assert_eq!( registry.flush().unwrap(), 1 );
    assert_eq!( registry.pending(), 0 );
    assert!( !artist.core().is_dirty() );

    let stored = store.load( &ItemKey::new( "artist", "A1" ) ).unwrap().unwrap();
    assert_eq!( stored[ 0 ], json!( "Band" ) );
    assert_eq!( stored[ 4 ], json!( 500 ) );

    // Nothing changed since the last flush
    assert_eq!( registry.flush().unwrap(), 0 );
}


#[test]
fn clear_all_then_rehydrate() {
    let ( _, registry ) = memory_registry();
    let first = registry.get_or_create( "A1" ).unwrap();
    registry.get_or_create( "A2" ).unwrap();
    first.supply_subscriber_count( Some( 500 ), SupplyMode::SPECULATIVE );
    registry.flush().unwrap();

    assert_eq!( registry.clear_all(), 2 );
    assert!( registry.is_empty() );
    assert_eq!( registry.clear_all(), 0 );

    let second = registry.get_or_create( "A1" ).unwrap();
    assert!( !Arc::ptr_eq( &first, &second ) );
    assert_eq!( second.subscriber_count(), Some( 500 ) );
    assert_eq!( second.field_state( ArtistField::SubscriberCount ), FieldState::Certain );

    // Hydrated values are not written back
    assert!( !second.core().is_dirty() );
    assert_eq!( registry.pending(), 0 );
}


#[test]
fn hydrated_values_resist_speculative_writes() {
    let ( _, registry ) = memory_registry();
    registry.get_or_create( "A1" ).unwrap()
        .supply_subscribe_channel_id( Some( "UC1".into() ), SupplyMode::AUTHORITATIVE );
    registry.flush().unwrap();
    registry.clear_all();

    let artist = registry.get_or_create( "A1" ).unwrap();
    artist.supply_subscribe_channel_id( Some( "UC2".into() ), SupplyMode::SPECULATIVE );
    assert_eq!( artist.subscribe_channel_id(), Some( "UC1".to_string() ) );

    artist.supply_subscribe_channel_id( Some( "UC2".into() ), SupplyMode::AUTHORITATIVE );
    assert_eq!( artist.subscribe_channel_id(), Some( "UC2".to_string() ) );
    assert_eq!( registry.pending(), 1 );
}


#[test]
fn bad_cached_data_is_ignored() {
    let ( store, registry ) = memory_registry();
    store.save( &ItemKey::new( "artist", "A1" ), &[ json!( 1 ) ] ).unwrap();

    let artist = registry.get_or_create( "A1" ).unwrap();
    assert_eq!( artist.title(), None );
    assert_eq!( artist.subscriber_count(), None );
}


#[test]
fn placeholder_round_trips_through_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ItemStore> = Arc::new( JsonFileStore::new( dir.path() ) );

    let registry: Registry<Artist> = Registry::new( Arc::clone( &store ) );
    let placeholder = registry.create_for_item( "song1" ).unwrap();
    placeholder.supply_title( Some( "Various".into() ), SupplyMode::SPECULATIVE );
    assert_eq!( registry.flush().unwrap(), 1 );

    let fresh: Registry<Artist> = Registry::new( store );
    let restored = fresh.get_or_create( "FSsong1" ).unwrap();
    assert_eq!( restored.title(), Some( "Various".to_string() ) );
    assert!( restored.is_for_item() );
    assert_eq!( restored.id(), "FSsong1" );
}


#[test]
fn temporary_items_are_isolated() {
    let ( store, registry ) = memory_registry();
    let a = registry.create_temporary();
    let b = registry.create_temporary();

    assert!( !Arc::ptr_eq( &a, &b ) );
    a.supply_subscriber_count( Some( 3 ), SupplyMode::AUTHORITATIVE );

    assert_eq!( registry.flush().unwrap(), 0 );
    assert!( store.is_empty() );
    assert!( registry.is_empty() );
}
