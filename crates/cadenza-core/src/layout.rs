//! Feed layouts attached to items (shelves on an artist page, etc.)

use serde::{ Deserialize, Serialize };


/// How a layout's items are presented.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize )]
#[serde( rename_all = "snake_case" )]
pub enum LayoutType {
    #[default]
    Grid,
    List,
    NumberedList,
    Row,
}


/// A titled group of media items.
#[derive( Debug, Clone, PartialEq, Default, Serialize, Deserialize )]
#[serde( default )]
pub struct MediaItemLayout {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub layout_type: LayoutType,
    pub item_ids: Vec<String>,
    /// Browse id of the "more" page, if the shelf is truncated.
    pub view_more: Option<String>,
}


impl MediaItemLayout {
    pub fn new( title: impl Into<String>, layout_type: LayoutType ) -> Self {
        Self {
            title: Some( title.into() ),
            layout_type,
            ..Self::default()
        }
    }


    /// Adds item ids to the layout.
    pub fn with_items( mut self, ids: impl IntoIterator<Item = impl Into<String>> ) -> Self {
        self.item_ids.extend( ids.into_iter().map( Into::into ) );
        self
    }


    pub fn is_empty( &self ) -> bool {
        self.item_ids.is_empty()
    }
}
