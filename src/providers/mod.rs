pub mod index_list;
pub mod yahoo_finance;
