//! Certainty-aware field values
//!
//! Every mutable item field is written through the same merge rule: a newly
//! observed value replaces the held one only if it differs and either nothing
//! is held yet or the write is marked certain.


/// Provenance of a field value.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum FieldState {
    #[default]
    Unset,
    Uncertain,
    Certain,
}


/// Flags accompanying every field write.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub struct SupplyMode {
    /// The value is authoritative and may override an existing value.
    pub certain: bool,
    /// The value was read back from local storage rather than fetched.
    pub cached: bool,
}


impl SupplyMode {
    /// Best-effort value from a partial or speculative response.
    pub const SPECULATIVE: Self = Self { certain: false, cached: false };

    /// Confirmed value from a live fetch.
    pub const AUTHORITATIVE: Self = Self { certain: true, cached: false };

    /// Value restored from persisted storage.
    pub const HYDRATE: Self = Self { certain: true, cached: true };


    pub const fn new( certain: bool, cached: bool ) -> Self {
        Self { certain, cached }
    }
}


impl Default for SupplyMode {
    fn default() -> Self {
        Self::SPECULATIVE
    }
}


/// Returns true if `incoming` may replace `current`.
pub fn accepts<T: PartialEq>( current: Option<&T>, incoming: Option<&T>, certain: bool ) -> bool {
    incoming != current && ( current.is_none() || certain )
}


/// Merges `incoming` into `current`.
///
/// @param current - The value currently held
/// @param incoming - The newly observed value
/// @param certain - Whether the incoming value is authoritative
///
/// @returns The resulting value and whether it differs from `current`
pub fn supply<T: PartialEq>( current: Option<T>, incoming: Option<T>, certain: bool ) -> ( Option<T>, bool ) {
    if accepts( current.as_ref(), incoming.as_ref(), certain ) {
        ( incoming, true )
    } else {
        ( current, false )
    }
}


/// A nullable value tagged with its provenance.
#[derive( Debug, Clone, PartialEq )]
pub struct Field<T> {
    value: Option<T>,
    state: FieldState,
}


impl<T> Default for Field<T> {
    fn default() -> Self {
        Self { value: None, state: FieldState::Unset }
    }
}


impl<T: PartialEq> Field<T> {
    /// Creates an unset field.
    pub fn new() -> Self {
        Self::default()
    }


    /// Gets the current value.
    pub fn get( &self ) -> Option<&T> {
        self.value.as_ref()
    }


    /// Gets the provenance of the current value.
    pub fn state( &self ) -> FieldState {
        self.state
    }


    /// Returns true if a value is held.
    pub fn is_set( &self ) -> bool {
        self.value.is_some()
    }


    /// Applies the merge rule to this field.
    ///
    /// A certain write of the value already held changes nothing observable
    /// but marks the value as certain.
    ///
    /// @returns true if the held value changed
    pub fn supply( &mut self, incoming: Option<T>, certain: bool ) -> bool {
        if accepts( self.value.as_ref(), incoming.as_ref(), certain ) {
            self.state = match ( &incoming, certain ) {
                ( None, _ ) => FieldState::Unset,
                ( Some( _ ), true ) => FieldState::Certain,
                ( Some( _ ), false ) => FieldState::Uncertain,
            };
            self.value = incoming;
            return true;
        }

        if certain && self.value.is_some() && incoming == self.value {
            self.state = FieldState::Certain;
        }
        false
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_supply_into_unset() {
        let ( value, changed ) = supply( None, Some( 5 ), false );
        assert_eq!( value, Some( 5 ) );
        assert!( changed );
    }


    #[test]
    fn test_supply_uncertain_keeps_existing() {
        let ( value, changed ) = supply( Some( 5 ), Some( 6 ), false );
        assert_eq!( value, Some( 5 ) );
        assert!( !changed );
    }


    #[test]
    fn test_supply_certain_overrides() {
        let ( value, changed ) = supply( Some( 5 ), Some( 6 ), true );
        assert_eq!( value, Some( 6 ) );
        assert!( changed );
    }


    #[test]
    fn test_supply_equal_is_not_a_change() {
        let ( value, changed ) = supply( Some( 5 ), Some( 5 ), true );
        assert_eq!( value, Some( 5 ) );
        assert!( !changed );
    }


    #[test]
    fn test_field_walkthrough() {
        let mut count: Field<u64> = Field::new();
        assert_eq!( count.state(), FieldState::Unset );

        assert!( count.supply( Some( 500 ), false ) );
        assert_eq!( count.get(), Some( &500 ) );
        assert_eq!( count.state(), FieldState::Uncertain );

        assert!( !count.supply( Some( 480 ), false ) );
        assert_eq!( count.get(), Some( &500 ) );

        assert!( count.supply( Some( 510 ), true ) );
        assert_eq!( count.get(), Some( &510 ) );
        assert_eq!( count.state(), FieldState::Certain );

        assert!( !count.supply( Some( 1 ), false ) );
        assert_eq!( count.get(), Some( &510 ) );
        assert_eq!( count.state(), FieldState::Certain );
    }


    #[test]
    fn test_equal_certain_write_promotes_state() {
        let mut name: Field<String> = Field::new();
        name.supply( Some( "a".into() ), false );

        assert!( !name.supply( Some( "a".into() ), true ) );
        assert_eq!( name.state(), FieldState::Certain );
    }


    #[test]
    fn test_uncertain_null_does_not_clear() {
        let mut name: Field<String> = Field::new();
        name.supply( Some( "a".into() ), false );

        assert!( !name.supply( None, false ) );
        assert!( name.is_set() );
    }


    #[test]
    fn test_certain_null_clears() {
        let mut name: Field<String> = Field::new();
        name.supply( Some( "a".into() ), true );

        assert!( name.supply( None, true ) );
        assert!( !name.is_set() );
        assert_eq!( name.state(), FieldState::Unset );
    }
}
