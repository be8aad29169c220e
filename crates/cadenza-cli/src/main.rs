//! Cadenza CLI - media item cache maintenance

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{ Context, Result };
use clap::Parser;
use serde_json::{ json, Value };
use tracing_subscriber::EnvFilter;

use cadenza_core::settings::{ DiscordSettingsKey, JsonPreferences, Preferences, SettingsValue };
use cadenza_core::{ Artist, ArtistField, ItemStore, JsonFileStore, MediaItem, Registry, SupplyMode };

use cli::{ Args, Command, SettingsCommand };


fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter( EnvFilter::try_from_default_env().unwrap_or_else( |_| EnvFilter::new( "info" ) ) )
        .with_writer( std::io::stderr )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Show { id } => {
            let registry = open_registry( args.cache_dir )?;
            let artist = registry.get_or_create( &id )?;
            println!( "{}", serde_json::to_string_pretty( &describe( &artist ) )? );
        }
        Command::Supply { id, title, channel, subscribers, certain } => {
            let registry = open_registry( args.cache_dir )?;
            let artist = registry.get_or_create( &id )?;
            let mode = SupplyMode::new( certain, false );

            if title.is_some() {
                artist.supply_title( title, mode );
            }
            if channel.is_some() {
                artist.supply_subscribe_channel_id( channel, mode );
            }
            if subscribers.is_some() {
                artist.supply_subscriber_count( subscribers, mode );
            }

            let written = registry.flush()?;
            tracing::info!( "Wrote {} item(s)", written );
            println!( "{}", serde_json::to_string_pretty( &describe( &artist ) )? );
        }
        Command::Forget { id } => {
            let store = open_store( args.cache_dir )?;
            let key = Artist::create( id, false, None ).key();
            if store.remove( &key )? {
                println!( "Removed {}", key );
            } else {
                println!( "{} is not cached", key );
            }
        }
        Command::Settings( command ) => run_settings( args.settings, command )?,
    }

    Ok(())
}


fn open_store( cache_dir: Option<PathBuf> ) -> Result<JsonFileStore> {
    match cache_dir {
        Some( dir ) => Ok( JsonFileStore::new( dir ) ),
        None => Ok( JsonFileStore::open_default()? ),
    }
}


fn open_registry( cache_dir: Option<PathBuf> ) -> Result<Registry<Artist>> {
    let store: Arc<dyn ItemStore> = Arc::new( open_store( cache_dir )? );
    Ok( Registry::new( store ) )
}


/// Renders an artist with the provenance of each field.
fn describe( artist: &Artist ) -> Value {
    let state = |field| format!( "{:?}", artist.field_state( field ) );

    json!({
        "id": artist.id(),
        "url": artist.url(),
        "is_for_item": artist.is_for_item(),
        "fully_loaded": artist.is_fully_loaded(),
        "title": { "value": artist.title(), "state": state( ArtistField::Title ) },
        "subscribe_channel_id": {
            "value": artist.subscribe_channel_id(),
            "state": state( ArtistField::SubscribeChannelId ),
        },
        "subscriber_count": {
            "value": artist.subscriber_count(),
            "readable": artist.readable_subscriber_count(),
            "state": state( ArtistField::SubscriberCount ),
        },
        "feed_layouts": {
            "count": artist.feed_layouts().map( |l| l.len() ),
            "state": state( ArtistField::FeedLayouts ),
        },
    })
}


fn run_settings( path: Option<PathBuf>, command: SettingsCommand ) -> Result<()> {
    let path = path
        .or_else( JsonPreferences::default_path )
        .context( "No config directory available; pass --settings" )?;
    let prefs: Arc<dyn Preferences> = Arc::new( JsonPreferences::load( path ) );

    let value_for = |key: &str| -> Result<SettingsValue<Value>> {
        let key: DiscordSettingsKey = key.parse()?;
        Ok( key.value( Arc::clone( &prefs ) ) )
    };

    match command {
        SettingsCommand::List => {
            for key in DiscordSettingsKey::ALL {
                let value: SettingsValue<Value> = key.value( Arc::clone( &prefs ) );
                println!( "{} = {}", key.name(), value.get()? );
            }
        }
        SettingsCommand::Get { key } => {
            println!( "{}", value_for( &key )?.get()? );
        }
        SettingsCommand::Set { key, value } => {
            let parsed = serde_json::from_str( &value ).unwrap_or( Value::String( value ) );
            let setting = value_for( &key )?;
            check_type( &setting.default_value()?, &parsed )
                .with_context( || format!( "Invalid value for {}", key ) )?;
            setting.set( &parsed )?;
        }
        SettingsCommand::Reset { key } => {
            value_for( &key )?.reset();
        }
    }

    Ok(())
}


/// Rejects values whose JSON type differs from the key's default.
fn check_type( default: &Value, value: &Value ) -> Result<()> {
    let same = matches!(
        ( default, value ),
        ( Value::Bool( _ ), Value::Bool( _ ) ) | ( Value::String( _ ), Value::String( _ ) )
    );
    anyhow::ensure!( same, "expected a value like {}", default );
    Ok(())
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_check_type() {
        assert!( check_type( &json!( true ), &json!( false ) ).is_ok() );
        assert!( check_type( &json!( "" ), &json!( "text" ) ).is_ok() );
        assert!( check_type( &json!( true ), &json!( "yes" ) ).is_err() );
    }


    #[test]
    fn test_describe() {
        let artist = Artist::create( "UC1".into(), false, None );
        artist.supply_subscriber_count( Some( 1_500 ), SupplyMode::AUTHORITATIVE );

        let value = describe( &artist );
        assert_eq!( value[ "subscriber_count" ][ "value" ], json!( 1_500 ) );
        assert_eq!( value[ "subscriber_count" ][ "readable" ], json!( "1.5K subscribers" ) );
        assert_eq!( value[ "subscriber_count" ][ "state" ], json!( "Certain" ) );
        assert_eq!( value[ "title" ][ "state" ], json!( "Unset" ) );
    }


    #[test]
    fn test_parse_supply() {
        let args = Args::try_parse_from( [ "cadenza", "supply", "UC1", "--subscribers", "10", "-c" ] ).unwrap();
        match args.command {
            Command::Supply { id, subscribers, certain, .. } => {
                assert_eq!( id, "UC1" );
                assert_eq!( subscribers, Some( 10 ) );
                assert!( certain );
            }
            other => panic!( "unexpected command: {:?}", other ),
        }
    }
}
