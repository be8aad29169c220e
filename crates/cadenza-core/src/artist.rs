//! Artist items

use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::{ Arc, PoisonError, RwLock, RwLockReadGuard };

use serde_json::Value;

use crate::codec::{ self, CodecError };
use crate::field::{ Field, FieldState, SupplyMode };
use crate::item::{ ItemCore, MediaItem };
use crate::layout::MediaItemLayout;
use crate::store::PersistQueue;


/// Number of serialised values an artist appends after the base fields.
pub const ARTIST_FIELD_COUNT: usize = 4;

/// Prefix of ids minted by [`Registry::create_for_item`](crate::Registry::create_for_item).
pub const FOR_ITEM_PREFIX: &str = "FS";


/// Certainty-tracked artist fields.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum ArtistField {
    Title,
    SubscribeChannelId,
    SubscriberCount,
    FeedLayouts,
}


#[derive( Debug, Default )]
struct ArtistData {
    subscribe_channel_id: Field<String>,
    subscriber_count: Field<u64>,
    feed_layouts: Field<Vec<MediaItemLayout>>,
}


/// An artist (channel).
#[derive( Debug )]
pub struct Artist {
    core: ItemCore,
    is_for_item: AtomicBool,
    data: RwLock<ArtistData>,
    subscribed: RwLock<Option<bool>>,
    is_own_channel: AtomicBool,
}


impl MediaItem for Artist {
    const KIND: &'static str = "artist";


    fn create( id: String, is_for_item: bool, queue: Option<Arc<PersistQueue>> ) -> Self {
        Self {
            core: ItemCore::new( Self::KIND, id, queue ),
            is_for_item: AtomicBool::new( is_for_item ),
            data: RwLock::new( ArtistData::default() ),
            subscribed: RwLock::new( None ),
            is_own_channel: AtomicBool::new( false ),
        }
    }


    fn core( &self ) -> &ItemCore {
        &self.core
    }


    fn serialise( &self ) -> Result<Vec<Value>, CodecError> {
        let mut out = self.core.serialise_base()?;
        let data = self.read();
        out.push( codec::encode( data.subscribe_channel_id.get() )? );
        out.push( Value::Bool( self.is_for_item() ) );
        out.push( codec::encode( data.subscriber_count.get() )? );
        out.push( codec::encode( data.feed_layouts.get() )? );
        Ok( out )
    }


    fn supply_from_serialised( &self, mut data: Vec<Value> ) -> Result<(), CodecError> {
        codec::require_len( &data, ARTIST_FIELD_COUNT )?;
        let feed_layouts: Option<Vec<MediaItemLayout>> = codec::pop( &mut data )?;
        let subscriber_count: Option<u64> = codec::pop( &mut data )?;
        let is_for_item: Option<bool> = codec::pop( &mut data )?;
        let subscribe_channel_id: Option<String> = codec::pop( &mut data )?;
        let base = ItemCore::decode_base( data )?;

        if feed_layouts.is_some() {
            self.supply_feed_layouts( feed_layouts, SupplyMode::HYDRATE );
        }
        if subscriber_count.is_some() {
            self.supply_subscriber_count( subscriber_count, SupplyMode::HYDRATE );
        }
        if let Some( flag ) = is_for_item {
            self.is_for_item.store( flag, Ordering::SeqCst );
        }
        if subscribe_channel_id.is_some() {
            self.supply_subscribe_channel_id( subscribe_channel_id, SupplyMode::HYDRATE );
        }
        self.core.apply_base( base );
        Ok(())
    }
}


impl Artist {
    fn read( &self ) -> RwLockReadGuard<'_, ArtistData> {
        self.data.read().unwrap_or_else( PoisonError::into_inner )
    }


    /// Applies `write` under the data lock, then notifies if it reported a change.
    fn supply_with( &self, mode: SupplyMode, write: impl FnOnce( &mut ArtistData ) -> bool ) -> &Self {
        let changed = write( &mut self.data.write().unwrap_or_else( PoisonError::into_inner ) );
        if changed {
            self.core.on_changed( mode.cached );
        }
        self
    }


    /// True for placeholder artists minted for content without a canonical artist.
    pub fn is_for_item( &self ) -> bool {
        self.is_for_item.load( Ordering::SeqCst )
    }


    pub fn title( &self ) -> Option<String> {
        self.core.title()
    }


    pub fn supply_title( &self, value: Option<String>, mode: SupplyMode ) -> &Self {
        self.core.supply_title( value, mode );
        self
    }


    pub fn subscribe_channel_id( &self ) -> Option<String> {
        self.read().subscribe_channel_id.get().cloned()
    }


    pub fn supply_subscribe_channel_id( &self, value: Option<String>, mode: SupplyMode ) -> &Self {
        self.supply_with( mode, |d| d.subscribe_channel_id.supply( value, mode.certain ) )
    }


    pub fn subscriber_count( &self ) -> Option<u64> {
        self.read().subscriber_count.get().copied()
    }


    pub fn supply_subscriber_count( &self, value: Option<u64>, mode: SupplyMode ) -> &Self {
        self.supply_with( mode, |d| d.subscriber_count.supply( value, mode.certain ) )
    }


    pub fn feed_layouts( &self ) -> Option<Vec<MediaItemLayout>> {
        self.read().feed_layouts.get().cloned()
    }


    pub fn supply_feed_layouts( &self, value: Option<Vec<MediaItemLayout>>, mode: SupplyMode ) -> &Self {
        self.supply_with( mode, |d| d.feed_layouts.supply( value, mode.certain ) )
    }


    /// Gets the provenance of one field.
    pub fn field_state( &self, field: ArtistField ) -> FieldState {
        match field {
            ArtistField::Title => self.core.title_state(),
            ArtistField::SubscribeChannelId => self.read().subscribe_channel_id.state(),
            ArtistField::SubscriberCount => self.read().subscriber_count.state(),
            ArtistField::FeedLayouts => self.read().feed_layouts.state(),
        }
    }


    /// Whether the signed-in user follows this artist; `None` until known.
    pub fn subscribed( &self ) -> Option<bool> {
        *self.subscribed.read().unwrap_or_else( PoisonError::into_inner )
    }


    pub fn set_subscribed( &self, value: Option<bool> ) {
        *self.subscribed.write().unwrap_or_else( PoisonError::into_inner ) = value;
    }


    pub fn is_own_channel( &self ) -> bool {
        self.is_own_channel.load( Ordering::SeqCst )
    }


    pub fn set_own_channel( &self, value: bool ) {
        self.is_own_channel.store( value, Ordering::SeqCst );
    }


    /// True once the artist page has been loaded.
    pub fn is_fully_loaded( &self ) -> bool {
        self.core.title().is_some() && self.read().subscribe_channel_id.is_set()
    }


    pub fn url( &self ) -> String {
        format!( "https://music.youtube.com/channel/{}", self.id() )
    }


    /// Formats the subscriber count for display, e.g. "1.2M subscribers".
    ///
    /// Returns an empty string while the count is unknown.
    pub fn readable_subscriber_count( &self ) -> String {
        self.subscriber_count()
            .map( |n| format!( "{} subscribers", amount_to_string( n ) ) )
            .unwrap_or_default()
    }
}


/// Compacts a count into a short display form ("999", "1.2K", "15M").
pub fn amount_to_string( amount: u64 ) -> String {
    const UNITS: [( u64, &str ); 3] = [
        ( 1_000_000_000, "B" ),
        ( 1_000_000, "M" ),
        ( 1_000, "K" ),
    ];

    for ( divisor, suffix ) in UNITS {
        if amount < divisor {
            continue;
        }

        let value = amount as f64 / divisor as f64;
        if value < 10.0 {
            let tenths = ( value * 10.0 ).floor() / 10.0;
            let text = format!( "{:.1}", tenths );
            return format!( "{}{}", text.trim_end_matches( ".0" ), suffix );
        }
        return format!( "{}{}", value.floor() as u64, suffix );
    }

    amount.to_string()
}


#[cfg( test )]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::item::ChangeEvent;
    use crate::layout::LayoutType;
    use serde_json::json;


    fn artist( id: &str ) -> Artist {
        Artist::create( id.to_string(), false, None )
    }


    #[test]
    fn test_subscriber_count_walkthrough() {
        let x = artist( "A1" );
        let events = Arc::new( Mutex::new( Vec::new() ) );
        let sink = Arc::clone( &events );
        x.core().add_listener( Arc::new( move |e: &ChangeEvent| sink.lock().unwrap().push( e.cached ) ) );

        assert_eq!( x.subscriber_count(), None );

        x.supply_subscriber_count( Some( 500 ), SupplyMode::SPECULATIVE );
        assert_eq!( x.subscriber_count(), Some( 500 ) );
        assert_eq!( *events.lock().unwrap(), vec![ false ] );

        x.supply_subscriber_count( Some( 480 ), SupplyMode::SPECULATIVE );
        assert_eq!( x.subscriber_count(), Some( 500 ) );

        x.supply_subscriber_count( Some( 510 ), SupplyMode::AUTHORITATIVE );
        assert_eq!( x.subscriber_count(), Some( 510 ) );
        assert_eq!( events.lock().unwrap().len(), 2 );

        x.supply_subscriber_count( Some( 1 ), SupplyMode::SPECULATIVE );
        assert_eq!( x.subscriber_count(), Some( 510 ) );
        assert_eq!( events.lock().unwrap().len(), 2 );
        assert_eq!( x.field_state( ArtistField::SubscriberCount ), FieldState::Certain );
    }


    #[test]
    fn test_serialise_layout() {
        let x = artist( "A1" );
        x.supply_title( Some( "Band".into() ), SupplyMode::AUTHORITATIVE )
            .supply_subscribe_channel_id( Some( "UC1".into() ), SupplyMode::AUTHORITATIVE )
            .supply_subscriber_count( Some( 42 ), SupplyMode::AUTHORITATIVE );

        let data = x.serialise().unwrap();
        assert_eq!( data, vec![
            json!( "Band" ),
            Value::Null,
            json!( "UC1" ),
            json!( false ),
            json!( 42 ),
            Value::Null,
        ] );
    }


    #[test]
    fn test_supply_from_serialised() {
        let layouts = vec![ MediaItemLayout::new( "Songs", LayoutType::List ).with_items( [ "s1", "s2" ] ) ];
        let source = artist( "A1" );
        source.supply_title( Some( "Band".into() ), SupplyMode::AUTHORITATIVE )
            .supply_subscribe_channel_id( Some( "UC1".into() ), SupplyMode::AUTHORITATIVE )
            .supply_subscriber_count( Some( 1_200 ), SupplyMode::SPECULATIVE )
            .supply_feed_layouts( Some( layouts.clone() ), SupplyMode::AUTHORITATIVE );

        let target = artist( "A1" );
        target.supply_from_serialised( source.serialise().unwrap() ).unwrap();

        assert_eq!( target.title(), Some( "Band".to_string() ) );
        assert_eq!( target.subscribe_channel_id(), Some( "UC1".to_string() ) );
        assert_eq!( target.subscriber_count(), Some( 1_200 ) );
        assert_eq!( target.feed_layouts(), Some( layouts ) );
        assert_eq!( target.field_state( ArtistField::SubscriberCount ), FieldState::Certain );
        assert!( !target.core().is_dirty() );
        assert!( target.is_fully_loaded() );
    }


    #[test]
    fn test_supply_from_serialised_rejects_short_input() {
        let x = artist( "A1" );
        let err = x.supply_from_serialised( vec![ Value::Null; 3 ] ).unwrap_err();
        assert!( matches!( err, CodecError::Truncated { expected: 4, found: 3 } ) );

        // Artist fields present but base fields missing
        let err = x.supply_from_serialised( vec![ Value::Null; 5 ] ).unwrap_err();
        assert!( matches!( err, CodecError::Truncated { expected: 2, found: 1 } ) );
        assert_eq!( x.subscriber_count(), None );
    }


    #[test]
    fn test_is_fully_loaded() {
        let x = artist( "A1" );
        assert!( !x.is_fully_loaded() );

        x.supply_title( Some( "Band".into() ), SupplyMode::SPECULATIVE );
        assert!( !x.is_fully_loaded() );

        x.supply_subscribe_channel_id( Some( "UC1".into() ), SupplyMode::SPECULATIVE );
        assert!( x.is_fully_loaded() );
    }


    #[test]
    fn test_url_and_temp() {
        assert_eq!( artist( "UC123" ).url(), "https://music.youtube.com/channel/UC123" );
        assert!( artist( "" ).is_temp() );
        assert!( !artist( "UC123" ).is_temp() );
    }


    #[test]
    fn test_readable_subscriber_count() {
        let x = artist( "A1" );
        assert_eq!( x.readable_subscriber_count(), "" );

        x.supply_subscriber_count( Some( 2_540_000 ), SupplyMode::SPECULATIVE );
        assert_eq!( x.readable_subscriber_count(), "2.5M subscribers" );
    }


    #[test]
    fn test_amount_to_string() {
        assert_eq!( amount_to_string( 0 ), "0" );
        assert_eq!( amount_to_string( 999 ), "999" );
        assert_eq!( amount_to_string( 1_000 ), "1K" );
        assert_eq!( amount_to_string( 1_250 ), "1.2K" );
        assert_eq!( amount_to_string( 9_999 ), "9.9K" );
        assert_eq!( amount_to_string( 15_300 ), "15K" );
        assert_eq!( amount_to_string( 999_999 ), "999K" );
        assert_eq!( amount_to_string( 3_000_000_000 ), "3B" );
    }
}
