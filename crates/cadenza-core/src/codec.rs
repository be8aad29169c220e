//! Serialised item data
//!
//! Items persist as a flat, fixed-order list of JSON values. Writers append
//! base fields first and their own fields after; readers pop in reverse.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;


/// Errors that can occur while encoding or decoding item data.
#[derive( Debug, Error )]
pub enum CodecError {
    #[error( "Serialised data too short: expected at least {expected} values, found {found}" )]
    Truncated { expected: usize, found: usize },

    #[error( "Invalid serialised value: {0}" )]
    Value( #[from] serde_json::Error ),
}


/// Fails unless `data` holds at least `expected` values.
pub fn require_len( data: &[Value], expected: usize ) -> Result<(), CodecError> {
    if data.len() < expected {
        return Err( CodecError::Truncated { expected, found: data.len() } );
    }
    Ok(())
}


/// Encodes an optional value; `None` becomes JSON null.
pub fn encode<T: Serialize>( value: Option<&T> ) -> Result<Value, CodecError> {
    Ok( serde_json::to_value( value )? )
}


/// Pops and decodes the last value; JSON null decodes to `None`.
pub fn pop<T: DeserializeOwned>( data: &mut Vec<Value> ) -> Result<Option<T>, CodecError> {
    let value = data.pop().ok_or( CodecError::Truncated { expected: 1, found: 0 } )?;
    if value.is_null() {
        return Ok( None );
    }
    Ok( Some( serde_json::from_value( value )? ) )
}


#[cfg( test )]
mod tests {
    use super::*;
    use serde_json::json;


    #[test]
    fn test_require_len() {
        let data = vec![ json!( 1 ), json!( 2 ) ];
        assert!( require_len( &data, 2 ).is_ok() );

        let err = require_len( &data, 3 ).unwrap_err();
        assert!( matches!( err, CodecError::Truncated { expected: 3, found: 2 } ) );
    }


    #[test]
    fn test_pop_reads_from_the_end() {
        let mut data = vec![ json!( "first" ), Value::Null, json!( 42 ) ];

        assert_eq!( pop::<u64>( &mut data ).unwrap(), Some( 42 ) );
        assert_eq!( pop::<String>( &mut data ).unwrap(), None );
        assert_eq!( pop::<String>( &mut data ).unwrap(), Some( "first".to_string() ) );
        assert!( pop::<String>( &mut data ).is_err() );
    }


    #[test]
    fn test_pop_rejects_wrong_type() {
        let mut data = vec![ json!( "not a number" ) ];
        assert!( matches!( pop::<u64>( &mut data ), Err( CodecError::Value( _ ) ) ) );
    }


    #[test]
    fn test_encode_none_is_null() {
        assert_eq!( encode::<String>( None ).unwrap(), Value::Null );
        assert_eq!( encode( Some( &7_u64 ) ).unwrap(), json!( 7 ) );
    }
}
