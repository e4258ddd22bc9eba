//! Raster element trait for generic cell values

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Storage type of a raster cell, as written to and read from files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

/// Trait for types that can be stored in a raster cell.
///
/// This trait bounds the types that can be used as raster values,
/// ensuring they support necessary numeric operations.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// On-disk data type corresponding to this element
    fn data_type() -> DataType;

    /// Default no-data value for this type
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Whether this type is a floating point type
    fn is_float() -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty, $dt:expr) => {
        impl RasterElement for $t {
            fn data_type() -> DataType {
                $dt
            }

            fn default_nodata() -> Self {
                <$t>::MIN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                match nodata {
                    Some(nd) => *self == nd,
                    None => false,
                }
            }

            fn is_float() -> bool {
                false
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty, $dt:expr) => {
        impl RasterElement for $t {
            fn data_type() -> DataType {
                $dt
            }

            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) => (self - nd).abs() < <$t>::EPSILON * 100.0,
                    None => false,
                }
            }

            fn is_float() -> bool {
                true
            }
        }
    };
}

impl_raster_element_int!(i8, DataType::Int8);
impl_raster_element_int!(i16, DataType::Int16);
impl_raster_element_int!(i32, DataType::Int32);
impl_raster_element_int!(i64, DataType::Int64);
impl_raster_element_int!(u8, DataType::UInt8);
impl_raster_element_int!(u16, DataType::UInt16);
impl_raster_element_int!(u32, DataType::UInt32);
impl_raster_element_int!(u64, DataType::UInt64);
impl_raster_element_float!(f32, DataType::Float32);
impl_raster_element_float!(f64, DataType::Float64);
