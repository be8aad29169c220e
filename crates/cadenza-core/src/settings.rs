//! Settings values bound to preference keys
//!
//! A [`SettingsValue`] reads and writes one key of a [`Preferences`] store,
//! falling back to a default provider when the key is unset.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::{ Path, PathBuf };
use std::str::FromStr;
use std::sync::{ Arc, PoisonError, RwLock };

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{ json, Value };
use thiserror::Error;


/// Errors that can occur with settings operations.
#[derive( Debug, Error )]
pub enum SettingsError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Invalid value for {key}: {source}" )]
    Invalid {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error( "No default for key: {0}" )]
    NoDefault( String ),

    #[error( "Unknown settings key: {0}" )]
    UnknownKey( String ),
}


/// Raw key/value preference storage.
pub trait Preferences: Send + Sync {
    fn get( &self, key: &str ) -> Option<Value>;

    fn set( &self, key: &str, value: Value );

    /// @returns true if the key was set
    fn remove( &self, key: &str ) -> bool;
}


/// Supplies the default value of a key.
pub type DefaultProvider = Arc<dyn Fn( &str ) -> Option<Value> + Send + Sync>;


/// In-memory preferences.
#[derive( Debug, Default )]
pub struct MemoryPreferences {
    values: RwLock<BTreeMap<String, Value>>,
}


impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}


impl Preferences for MemoryPreferences {
    fn get( &self, key: &str ) -> Option<Value> {
        self.values.read().unwrap_or_else( PoisonError::into_inner ).get( key ).cloned()
    }


    fn set( &self, key: &str, value: Value ) {
        self.values.write().unwrap_or_else( PoisonError::into_inner ).insert( key.to_string(), value );
    }


    fn remove( &self, key: &str ) -> bool {
        self.values.write().unwrap_or_else( PoisonError::into_inner ).remove( key ).is_some()
    }
}


/// Preferences persisted as a pretty-printed JSON object.
///
/// Every change is written back immediately; write failures are logged.
#[derive( Debug )]
pub struct JsonPreferences {
    path: PathBuf,
    values: RwLock<BTreeMap<String, Value>>,
}


impl JsonPreferences {
    /// Returns the default settings path (e.g. ~/.config/cadenza/settings.json on Linux).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map( |p| p.join( "cadenza" ).join( "settings.json" ) )
    }


    /// Loads preferences from `path`, starting empty if it is missing or unreadable.
    pub fn load( path: impl Into<PathBuf> ) -> Self {
        let path = path.into();
        let values = match fs::read_to_string( &path ) {
            Ok( contents ) => serde_json::from_str( &contents ).unwrap_or_else( |e| {
                tracing::warn!( "Ignoring malformed settings in {:?}: {}", path, e );
                BTreeMap::new()
            } ),
            Err( e ) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err( e ) => {
                tracing::warn!( "Failed to read settings: {}", e );
                BTreeMap::new()
            }
        };

        Self { path, values: RwLock::new( values ) }
    }


    pub fn path( &self ) -> &Path {
        &self.path
    }


    /// Writes all values to disk.
    pub fn save( &self ) -> Result<(), SettingsError> {
        if let Some( parent ) = self.path.parent() {
            fs::create_dir_all( parent )?;
        }

        let json = {
            let values = self.values.read().unwrap_or_else( PoisonError::into_inner );
            serde_json::to_string_pretty( &*values ).map_err( |source| SettingsError::Invalid {
                key: "*".into(),
                source,
            } )?
        };
        fs::write( &self.path, json )?;
        Ok(())
    }


    fn save_logged( &self ) {
        if let Err( e ) = self.save() {
            tracing::warn!( "Failed to save settings: {}", e );
        }
    }
}


impl Preferences for JsonPreferences {
    fn get( &self, key: &str ) -> Option<Value> {
        self.values.read().unwrap_or_else( PoisonError::into_inner ).get( key ).cloned()
    }


    fn set( &self, key: &str, value: Value ) {
        self.values.write().unwrap_or_else( PoisonError::into_inner ).insert( key.to_string(), value );
        self.save_logged();
    }


    fn remove( &self, key: &str ) -> bool {
        let removed = self.values.write().unwrap_or_else( PoisonError::into_inner ).remove( key ).is_some();
        if removed {
            self.save_logged();
        }
        removed
    }
}


/// A typed value bound to one preference key.
pub struct SettingsValue<T> {
    key: String,
    prefs: Arc<dyn Preferences>,
    defaults: DefaultProvider,
    _marker: PhantomData<fn() -> T>,
}


impl<T: Serialize + DeserializeOwned> SettingsValue<T> {
    pub fn new( key: impl Into<String>, prefs: Arc<dyn Preferences>, defaults: DefaultProvider ) -> Self {
        Self {
            key: key.into(),
            prefs,
            defaults,
            _marker: PhantomData,
        }
    }


    pub fn key( &self ) -> &str {
        &self.key
    }


    fn decode( &self, value: Value ) -> Result<T, SettingsError> {
        serde_json::from_value( value ).map_err( |source| SettingsError::Invalid {
            key: self.key.clone(),
            source,
        } )
    }


    /// Gets the value the default provider gives for this key.
    pub fn default_value( &self ) -> Result<T, SettingsError> {
        let value = ( self.defaults )( &self.key )
            .ok_or_else( || SettingsError::NoDefault( self.key.clone() ) )?;
        self.decode( value )
    }


    /// Gets the stored value, or the default if unset or undecodable.
    pub fn get( &self ) -> Result<T, SettingsError> {
        if let Some( stored ) = self.prefs.get( &self.key ) {
            match self.decode( stored ) {
                Ok( value ) => return Ok( value ),
                Err( e ) => tracing::warn!( "{}; using default", e ),
            }
        }
        self.default_value()
    }


    pub fn set( &self, value: &T ) -> Result<(), SettingsError> {
        let encoded = serde_json::to_value( value ).map_err( |source| SettingsError::Invalid {
            key: self.key.clone(),
            source,
        } )?;
        self.prefs.set( &self.key, encoded );
        Ok(())
    }


    /// Removes the stored value so the default applies again.
    pub fn reset( &self ) {
        self.prefs.remove( &self.key );
    }
}


impl<T> fmt::Debug for SettingsValue<T> {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.debug_struct( "SettingsValue" ).field( "key", &self.key ).finish_non_exhaustive()
    }
}


/// Preference keys of the Discord status integration.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum DiscordSettingsKey {
    AccountToken,
    WarningAccepted,
    StatusDisableWhenInvisible,
    StatusDisableWhenDnd,
    StatusDisableWhenIdle,
    StatusDisableWhenOffline,
    StatusDisableWhenOnline,
    StatusName,
    StatusTextA,
    StatusTextB,
    StatusTextC,
    ShowSongButton,
    SongButtonText,
    ShowProjectButton,
    ProjectButtonText,
}


impl DiscordSettingsKey {
    pub const ALL: [Self; 15] = [
        Self::AccountToken,
        Self::WarningAccepted,
        Self::StatusDisableWhenInvisible,
        Self::StatusDisableWhenDnd,
        Self::StatusDisableWhenIdle,
        Self::StatusDisableWhenOffline,
        Self::StatusDisableWhenOnline,
        Self::StatusName,
        Self::StatusTextA,
        Self::StatusTextB,
        Self::StatusTextC,
        Self::ShowSongButton,
        Self::SongButtonText,
        Self::ShowProjectButton,
        Self::ProjectButtonText,
    ];


    /// Gets the preference key name.
    pub fn name( self ) -> &'static str {
        match self {
            Self::AccountToken => "auth.discord_account_token",
            Self::WarningAccepted => "internal.discord_warning_accepted",
            Self::StatusDisableWhenInvisible => "discord.status_disable_when_invisible",
            Self::StatusDisableWhenDnd => "discord.status_disable_when_dnd",
            Self::StatusDisableWhenIdle => "discord.status_disable_when_idle",
            Self::StatusDisableWhenOffline => "discord.status_disable_when_offline",
            Self::StatusDisableWhenOnline => "discord.status_disable_when_online",
            Self::StatusName => "discord.status_name",
            Self::StatusTextA => "discord.status_text_a",
            Self::StatusTextB => "discord.status_text_b",
            Self::StatusTextC => "discord.status_text_c",
            Self::ShowSongButton => "discord.show_song_button",
            Self::SongButtonText => "discord.song_button_text",
            Self::ShowProjectButton => "discord.show_project_button",
            Self::ProjectButtonText => "discord.project_button_text",
        }
    }


    /// Gets the value used when the key is unset.
    pub fn default_value( self ) -> Value {
        match self {
            Self::AccountToken => json!( "" ),
            Self::WarningAccepted => json!( false ),
            Self::StatusDisableWhenInvisible => json!( true ),
            Self::StatusDisableWhenDnd => json!( false ),
            Self::StatusDisableWhenIdle => json!( false ),
            Self::StatusDisableWhenOffline => json!( true ),
            Self::StatusDisableWhenOnline => json!( false ),
            Self::StatusName => json!( "{artist}" ),
            Self::StatusTextA => json!( "{song}" ),
            Self::StatusTextB => json!( "{artist}" ),
            Self::StatusTextC => json!( "" ),
            Self::ShowSongButton => json!( true ),
            Self::SongButtonText => json!( "Listen" ),
            Self::ShowProjectButton => json!( false ),
            Self::ProjectButtonText => json!( "Get Cadenza" ),
        }
    }


    /// Binds this key to a preference store.
    pub fn value<T: Serialize + DeserializeOwned>( self, prefs: Arc<dyn Preferences> ) -> SettingsValue<T> {
        SettingsValue::new( self.name(), prefs, default_provider() )
    }
}


impl FromStr for DiscordSettingsKey {
    type Err = SettingsError;


    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find( |k| k.name() == s )
            .ok_or_else( || SettingsError::UnknownKey( s.to_string() ) )
    }
}


/// Default provider covering every known key.
pub fn provide_default( key: &str ) -> Option<Value> {
    key.parse::<DiscordSettingsKey>().ok().map( DiscordSettingsKey::default_value )
}


pub fn default_provider() -> DefaultProvider {
    Arc::new( provide_default )
}


/// Whether a Discord account is linked, derived from the stored token.
///
/// Turning it off clears the token; turning it on is left to the login flow.
#[derive( Debug )]
pub struct DiscordLoginState {
    token: SettingsValue<String>,
}


impl DiscordLoginState {
    pub fn new( prefs: Arc<dyn Preferences> ) -> Self {
        Self { token: DiscordSettingsKey::AccountToken.value( prefs ) }
    }


    pub fn key( &self ) -> &str {
        self.token.key()
    }


    pub fn get( &self ) -> Result<bool, SettingsError> {
        Ok( !self.token.get()?.is_empty() )
    }


    pub fn set( &self, signed_in: bool ) -> Result<(), SettingsError> {
        if !signed_in {
            self.token.set( &String::new() )?;
        }
        Ok(())
    }


    pub fn default_value( &self ) -> Result<bool, SettingsError> {
        Ok( !self.token.default_value()?.is_empty() )
    }


    pub fn reset( &self ) {
        self.token.reset();
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn prefs() -> Arc<dyn Preferences> {
        Arc::new( MemoryPreferences::new() )
    }


    #[test]
    fn test_get_falls_back_to_default() {
        let name: SettingsValue<String> = DiscordSettingsKey::StatusName.value( prefs() );
        assert_eq!( name.get().unwrap(), "{artist}" );
    }


    #[test]
    fn test_set_and_reset() {
        let prefs = prefs();
        let show: SettingsValue<bool> = DiscordSettingsKey::ShowSongButton.value( Arc::clone( &prefs ) );

        show.set( &false ).unwrap();
        assert!( !show.get().unwrap() );
        assert_eq!( prefs.get( "discord.show_song_button" ), Some( json!( false ) ) );

        show.reset();
        assert!( show.get().unwrap() );
        assert_eq!( prefs.get( "discord.show_song_button" ), None );
    }


    #[test]
    fn test_bad_stored_value_uses_default() {
        let prefs = prefs();
        prefs.set( "discord.show_song_button", json!( "yes" ) );

        let show: SettingsValue<bool> = DiscordSettingsKey::ShowSongButton.value( prefs );
        assert!( show.get().unwrap() );
    }


    #[test]
    fn test_unknown_key_has_no_default() {
        let value: SettingsValue<bool> = SettingsValue::new( "nope", prefs(), default_provider() );
        assert!( matches!( value.get(), Err( SettingsError::NoDefault( _ ) ) ) );
    }


    #[test]
    fn test_parse_key() {
        assert_eq!(
            "discord.status_text_b".parse::<DiscordSettingsKey>().unwrap(),
            DiscordSettingsKey::StatusTextB,
        );
        assert!( matches!( "discord.nope".parse::<DiscordSettingsKey>(), Err( SettingsError::UnknownKey( _ ) ) ) );
    }


    #[test]
    fn test_every_key_has_a_default() {
        for key in DiscordSettingsKey::ALL {
            assert_eq!( provide_default( key.name() ), Some( key.default_value() ) );
        }
    }


    #[test]
    fn test_discord_login_state() {
        let prefs = prefs();
        let login = DiscordLoginState::new( Arc::clone( &prefs ) );
        assert!( !login.get().unwrap() );
        assert!( !login.default_value().unwrap() );

        prefs.set( login.key(), json!( "token" ) );
        assert!( login.get().unwrap() );

        // Signing in only happens through the login flow
        login.set( true ).unwrap();
        assert_eq!( prefs.get( login.key() ), Some( json!( "token" ) ) );

        login.set( false ).unwrap();
        assert!( !login.get().unwrap() );
    }


    #[test]
    fn test_json_preferences_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "nested" ).join( "settings.json" );

        let prefs = JsonPreferences::load( &path );
        prefs.set( "discord.status_name", json!( "Now playing" ) );
        assert!( path.exists() );

        let reloaded = JsonPreferences::load( &path );
        assert_eq!( reloaded.get( "discord.status_name" ), Some( json!( "Now playing" ) ) );
        assert!( reloaded.remove( "discord.status_name" ) );
        assert_eq!( JsonPreferences::load( &path ).get( "discord.status_name" ), None );
    }


    #[test]
    fn test_json_preferences_tolerate_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "settings.json" );
        fs::write( &path, "{ not json" ).unwrap();

        let prefs = JsonPreferences::load( &path );
        assert_eq!( prefs.get( "anything" ), None );
    }
}
