pub mod categorymodel;
pub mod clientmodel;
pub mod jobmodel;
pub mod labourmodel;
pub mod otpmodel;
pub mod ratingmodel;
pub mod usermodel;
