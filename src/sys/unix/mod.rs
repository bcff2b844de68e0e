mod select;

pub use self::select::Select;
